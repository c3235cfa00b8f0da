//! Launch configuration discovery and persistence settings

use crate::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_LAUNCH_FILE, DEFAULT_RECENT_DYNAMIC_MAX};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationConfig {
    /// Debounce for workspace-root changes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Launch file path relative to each workspace root
    #[serde(default = "default_launch_file")]
    pub launch_file: String,
    /// Key-value store for the persisted selection.
    /// Defaults to `state.json` in the dapctl home.
    #[serde(default)]
    pub storage_file: Option<PathBuf>,
    #[serde(default = "default_recent_dynamic_max")]
    pub recent_dynamic_max: usize,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_launch_file() -> String {
    DEFAULT_LAUNCH_FILE.to_string()
}

fn default_recent_dynamic_max() -> usize {
    DEFAULT_RECENT_DYNAMIC_MAX
}

impl Default for ConfigurationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            launch_file: default_launch_file(),
            storage_file: None,
            recent_dynamic_max: default_recent_dynamic_max(),
        }
    }
}

impl ConfigurationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
