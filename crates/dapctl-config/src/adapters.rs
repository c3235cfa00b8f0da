//! Debug adapter executables and workspace tasks

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// How to reach the debug adapter for one debug type.
///
/// Either `command` (spawned, DAP over stdio) or `port` (TCP) must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCommand {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl AdapterCommand {
    pub fn is_tcp(&self) -> bool {
        self.command.is_none() && self.port.is_some()
    }
}

/// A workspace task runnable as `preLaunchTask` / `postDebugTask`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Long running task; counts as ready once started
    #[serde(default)]
    pub background: bool,
}
