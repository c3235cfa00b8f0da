//! Top-level dapctl configuration

use crate::adapters::{AdapterCommand, TaskDefinition};
use crate::connection::ConnectionConfig;
use crate::logging::LoggingConfig;
use crate::session::SessionConfig;
use crate::workspace::ConfigurationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main dapctl configuration (`dapctl.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub configuration: ConfigurationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Debug adapters keyed by debug type
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterCommand>,
    /// Workspace tasks keyed by label
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDefinition>,
}

impl Config {
    pub fn adapter(&self, debug_type: &str) -> Option<&AdapterCommand> {
        self.adapters.get(debug_type)
    }

    pub fn task(&self, label: &str) -> Option<&TaskDefinition> {
        self.tasks.get(label)
    }
}

impl Config {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.connection.channel_capacity == 0 {
            return Err("connection.channel_capacity must be greater than 0".to_string());
        }
        if self.connection.request_timeout_ms == Some(0) {
            return Err("connection.request_timeout_ms must be greater than 0 when set".to_string());
        }
        if self.configuration.launch_file.trim().is_empty() {
            return Err("configuration.launch_file must not be empty".to_string());
        }
        if self.configuration.recent_dynamic_max == 0 {
            return Err("configuration.recent_dynamic_max must be greater than 0".to_string());
        }
        for (debug_type, adapter) in &self.adapters {
            if adapter.command.is_none() && adapter.port.is_none() {
                return Err(format!(
                    "adapters.{}: either 'command' or 'port' must be set",
                    debug_type
                ));
            }
        }
        for (label, task) in &self.tasks {
            if task.command.trim().is_empty() {
                return Err(format!("tasks.{}: 'command' must not be empty", label));
            }
        }
        Ok(())
    }
}
