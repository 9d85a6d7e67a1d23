//! # Bridge Protocol
//!
//! The canonical wire format shared by every desktop peer (the AI-agent app,
//! the code editor, dashboards, CLIs) and by the relay hub.
//!
//! ## Data Flow
//!
//! ```text
//! application ──builders──→ Message ──check_message──→ JSON frame ──→ transport
//!                                                                        │
//! transport ──→ JSON frame ──parse_frame / validate──→ Message ──→ dispatch
//! ```
//!
//! ## Design Principles
//!
//! - **Closed sets**: message kinds ([`MessageType`]) and peer roles
//!   ([`SourceRole`]) are enumerations. Unknown values are never accepted.
//! - **Exhaustive reports**: [`validate`] reports every violated field at once,
//!   keyed by its path, instead of stopping at the first problem.
//! - **Builders only**: application code constructs envelopes through the
//!   functions in [`builders`], which always produce valid messages.
//! - **Malformed input is data**: validation never panics and never mutates
//!   state; a bad frame is an ordinary `Err` value.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod builders;
pub mod envelope;
pub mod errors;
pub mod kinds;
pub mod payloads;
pub mod roles;
pub mod schema;
pub mod validation;

pub use envelope::{now_ms, Message, PROTOCOL_VERSION};
pub use errors::{codes, ProtocolError};
pub use kinds::MessageType;
pub use payloads::*;
pub use roles::SourceRole;
pub use validation::{
    check_message, is_valid, parse_frame, validate, FieldViolation, ValidationReport,
};

/// Default endpoint of the relay hub.
pub const DEFAULT_HUB_URL: &str = "ws://127.0.0.1:5004";

/// Default port of the relay hub.
pub const DEFAULT_HUB_PORT: u16 = 5004;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_matches_port() {
        assert!(DEFAULT_HUB_URL.ends_with(&DEFAULT_HUB_PORT.to_string()));
    }
}
