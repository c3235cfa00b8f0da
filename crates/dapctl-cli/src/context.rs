//! CLI Context - configuration and workspace shared by all commands
//!
//! Created once at startup, passed to all commands.

use crate::host::{
    root_uri, ConsoleEditor, ConsoleMessages, EnvVariableResolver, FileStorage, FsLaunchSource,
    LaunchWatcher, ProcessDebugService, ProcessTaskService, StaticBreakpoints, StaticWorkspace,
};
use dapctl_application::{DebugContext, HostPorts};
use dapctl_config::paths::default_state_path;
use dapctl_config::{load_config, resolve_config_path, Config};
use dapctl_logging::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared context for CLI commands
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: Arc<Config>,
    /// Where the config was loaded from; `None` when running on defaults
    pub config_path: Option<PathBuf>,
    /// Workspace root directories, first one is current
    pub roots: Vec<PathBuf>,
}

impl CliContext {
    /// Resolve and load the config, then fix the workspace roots.
    ///
    /// Config discovery order:
    /// 1. `--config <path>` CLI argument
    /// 2. `DAPCTL_CONFIG` environment variable
    /// 3. `dapctl.toml` in the current directory
    ///
    /// Without any of them the defaults are used. Without `--workspace` the
    /// current directory is the only root.
    pub fn new(config: Option<&Path>, workspaces: Vec<PathBuf>) -> Result<Self, CliContextError> {
        let resolved = resolve_config_path(config).map_err(|e| CliContextError::ConfigLoad {
            path: config.map(Path::to_path_buf).unwrap_or_default(),
            reason: e.to_string(),
        })?;
        let loaded = match &resolved {
            Some(path) => load_config(path).map_err(|e| CliContextError::ConfigLoad {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            None => {
                debug!("No config file, using defaults");
                Config::default()
            }
        };

        let roots = if workspaces.is_empty() {
            vec![std::env::current_dir().map_err(CliContextError::CurrentDir)?]
        } else {
            workspaces
        };
        for root in &roots {
            if !root.is_dir() {
                return Err(CliContextError::NotADirectory(root.clone()));
            }
        }

        Ok(Self::with_config(loaded, resolved, roots))
    }

    pub fn with_config(config: Config, config_path: Option<PathBuf>, roots: Vec<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            roots,
        }
    }

    pub fn root_uris(&self) -> Vec<String> {
        self.roots.iter().map(|root| root_uri(root)).collect()
    }

    pub fn state_path(&self) -> PathBuf {
        self.config
            .configuration
            .storage_file
            .clone()
            .unwrap_or_else(default_state_path)
    }

    pub fn launch_source(&self) -> FsLaunchSource {
        FsLaunchSource::new(self.config.configuration.launch_file.clone())
    }

    /// Build the debug context over the process-backed host ports
    pub fn debug_context(&self, breakpoints: StaticBreakpoints) -> DebugContext {
        let config = &self.config;
        let cwd = self.roots.first().cloned().unwrap_or_default();
        let ports = HostPorts {
            debug: Arc::new(ProcessDebugService::new(
                config.adapters.clone(),
                config.connection.clone(),
            )),
            variables: Arc::new(EnvVariableResolver::new(cwd)),
            tasks: Arc::new(ProcessTaskService::new(
                config.tasks.clone(),
                self.config_path.clone(),
            )),
            messages: Arc::new(ConsoleMessages),
            editor: Arc::new(ConsoleEditor),
            storage: Arc::new(FileStorage::new(self.state_path())),
            workspace: Arc::new(StaticWorkspace::new(self.root_uris())),
            launch: Arc::new(self.launch_source()),
            breakpoints: Arc::new(breakpoints),
        };
        info!(
            roots = self.roots.len(),
            adapters = config.adapters.len(),
            "Host ports ready"
        );
        DebugContext::new(ports, config)
    }

    /// Watch every root's launch file; the receiver yields changed root URIs
    pub fn watch_launch_files(
        &self,
    ) -> dapctl_core::Result<(LaunchWatcher, mpsc::UnboundedReceiver<String>)> {
        LaunchWatcher::start(
            &self.root_uris(),
            &self.launch_source(),
            self.config.configuration.debounce(),
        )
    }
}

/// Errors that can occur when creating the CLI context
#[derive(Debug, thiserror::Error)]
pub enum CliContextError {
    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("Cannot determine the current directory: {0}")]
    CurrentDir(std::io::Error),

    #[error("Workspace root is not a directory: {0}")]
    NotADirectory(PathBuf),
}
