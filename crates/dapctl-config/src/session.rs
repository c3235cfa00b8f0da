//! Session start behavior

use crate::constants::{DEFAULT_CLIENT_ID, DEFAULT_CLIENT_NAME, DEFAULT_LOCALE};
use serde::{Deserialize, Serialize};

/// Which dirty editors are saved before a session starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveBeforeStart {
    /// Save every dirty editor
    #[default]
    All,
    /// Save dirty editors that already have a file on disk
    NonUntitled,
    /// Never save
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub save_before_start: SaveBeforeStart,
    /// `clientID` sent to adapters
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// `clientName` sent to adapters
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_before_start: SaveBeforeStart::default(),
            client_id: default_client_id(),
            client_name: default_client_name(),
            locale: default_locale(),
        }
    }
}
