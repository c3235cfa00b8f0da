//! Configuration types and loading for dapctl
//!
//! This crate provides:
//! - Configuration structures for every dapctl component
//! - Config file loading (TOML format)
//! - Default values as named constants
//!
//! # Module Organization
//!
//! - `connection` - DAP connection timeouts and transport settings
//! - `session` - Session start behavior (save before start, client identity)
//! - `workspace` - Launch file location, model sync debounce, persisted state
//! - `adapters` - Debug adapter executables and workspace tasks
//! - `logging` - Log file retention
//!
//! # Usage
//!
//! ```rust,ignore
//! use dapctl_config::{load_config, Config};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("dapctl.toml"))?;
//! println!("Launch file: {}", config.configuration.launch_file);
//! ```

mod loader;

pub mod constants;
pub mod paths;

mod adapters;
mod connection;
mod logging;
mod session;
mod types;
mod workspace;

pub use adapters::{AdapterCommand, TaskDefinition};
pub use connection::ConnectionConfig;
pub use loader::{load_config, load_config_from_str, resolve_config_path, ConfigError};
pub use logging::LoggingConfig;
pub use session::{SaveBeforeStart, SessionConfig};
pub use types::Config;
pub use workspace::ConfigurationConfig;

pub use constants::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_DISCONNECT_TIMEOUT_MS, DEFAULT_LOG_RETENTION_DAYS,
    DEFAULT_RECENT_DYNAMIC_MAX, DEFAULT_TERMINATE_TIMEOUT_MS,
};
