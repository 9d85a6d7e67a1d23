//! # Source Roles
//!
//! The closed set of named peers allowed on the bus.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a peer on the bus.
///
/// Every envelope carries the sender's role in `source`, and optionally the
/// addressee's role in `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// The AI-agent desktop app.
    Nova,
    /// The code-editor desktop app.
    Vibe,
    /// Monitoring dashboards.
    Dashboard,
    /// Command-line tools.
    Cli,
    /// The relay hub itself, sender of hub-originated messages.
    Hub,
}

impl SourceRole {
    /// Every role, in declaration order.
    pub const ALL: [SourceRole; 5] = [
        SourceRole::Nova,
        SourceRole::Vibe,
        SourceRole::Dashboard,
        SourceRole::Cli,
        SourceRole::Hub,
    ];

    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRole::Nova => "nova",
            SourceRole::Vibe => "vibe",
            SourceRole::Dashboard => "dashboard",
            SourceRole::Cli => "cli",
            SourceRole::Hub => "hub",
        }
    }

    /// Parse a wire name. Returns `None` for anything outside the closed set.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|role| role.as_str() == s)
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
