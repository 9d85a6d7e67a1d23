//! Cross-crate flows: client ↔ hub ↔ client.

pub mod command_flow;
pub mod routing;
