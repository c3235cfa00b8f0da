//! Debug session lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered lifecycle state of a debug session.
///
/// `Inactive < Initializing < Running < Stopped`, so `state >= Running` means the
/// session finished its configuration handshake.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DebugState {
    /// Connection closed or disposed
    #[default]
    Inactive,
    /// Waiting for the adapter's `initialized` event and configuration
    Initializing,
    /// Debuggee running
    Running,
    /// At least the focused thread is stopped
    Stopped,
}

impl DebugState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebugState::Inactive => "inactive",
            DebugState::Initializing => "initializing",
            DebugState::Running => "running",
            DebugState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DebugState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
