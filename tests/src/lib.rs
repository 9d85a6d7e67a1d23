//! # Desktop Bridge Test Suite
//!
//! End-to-end flows through a real hub on a loopback port, driven by real
//! `bridge-client` peers.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # In-process hub + peer harness
//! └── integration/
//!     ├── command_flow.rs   # request → execute → result → response
//!     └── routing.rs        # broadcast, directed, rejection, stats
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bridge-tests
//! cargo test -p bridge-tests integration::command_flow::
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod support;
