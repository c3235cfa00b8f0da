//! Log file retention

use crate::constants::DEFAULT_LOG_RETENTION_DAYS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Rotated `--log-file` files older than this are deleted at startup (0 = disabled)
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

fn default_log_retention_days() -> u32 {
    DEFAULT_LOG_RETENTION_DAYS
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_retention_days: default_log_retention_days(),
        }
    }
}
