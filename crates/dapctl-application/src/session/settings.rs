//! Per-session settings derived from `dapctl.toml`

use dapctl_config::{Config, SaveBeforeStart};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSessionSettings {
    pub client_id: String,
    pub client_name: String,
    pub locale: String,
    /// Default timeout for requests sent without one
    pub request_timeout: Option<Duration>,
    /// Budget for `terminate` and for the `terminated` event that follows it
    pub terminate_timeout: Duration,
    /// Budget for `disconnect` and for the `exited` event that follows it
    pub disconnect_timeout: Duration,
    pub save_before_start: SaveBeforeStart,
}

impl DebugSessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.session.client_id.clone(),
            client_name: config.session.client_name.clone(),
            locale: config.session.locale.clone(),
            request_timeout: config.connection.request_timeout(),
            terminate_timeout: config.connection.terminate_timeout(),
            disconnect_timeout: config.connection.disconnect_timeout(),
            save_before_start: config.session.save_before_start,
        }
    }
}

impl Default for DebugSessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
