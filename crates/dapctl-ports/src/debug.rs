//! Debug Service Port
//!
//! Debugger contributions (types, dynamic configuration providers, resolvers)
//! and the factory for debug adapter channels.
//!
//! # Resolution Flow
//!
//! ```text
//! DebugConfiguration
//!     |
//! resolve_debug_configuration            (debug type resolvers)
//!     |
//! VariableResolver::resolve              (${workspaceFolder}, ${command:...})
//!     |
//! resolve_debug_configuration_with_substituted_variables
//!     |
//! create_debug_session -> open_channel
//! ```

use async_trait::async_trait;
use dapctl_core::{DebugConfiguration, Resolution, Result};
use dapctl_dap::Channel;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

#[async_trait]
pub trait DebugService: Send + Sync {
    /// Debug types that have a registered debugger
    async fn debug_types(&self) -> Result<Vec<String>>;

    /// Configurations computed by dynamic providers, keyed by provider type
    async fn provide_dynamic_debug_configurations(
        &self,
    ) -> Result<BTreeMap<String, Vec<DebugConfiguration>>>;

    /// Ask the provider of `provider_type` for a fresh copy of a dynamic
    /// configuration. `None` when the provider no longer offers it.
    async fn fetch_dynamic_debug_configuration(
        &self,
        name: &str,
        provider_type: &str,
        workspace_folder_uri: Option<&str>,
    ) -> Result<Option<DebugConfiguration>>;

    /// First resolver pass, before variable substitution
    async fn resolve_debug_configuration(
        &self,
        configuration: DebugConfiguration,
        workspace_folder_uri: Option<&str>,
    ) -> Result<Resolution<DebugConfiguration>>;

    /// Second resolver pass, after variable substitution
    async fn resolve_debug_configuration_with_substituted_variables(
        &self,
        configuration: DebugConfiguration,
        workspace_folder_uri: Option<&str>,
    ) -> Result<Resolution<DebugConfiguration>>;

    /// `${command:ID}` variables contributed by the debugger of `debug_type`,
    /// mapped to the command that computes them
    async fn provide_debugger_variables(&self, debug_type: &str)
        -> Result<HashMap<String, String>>;

    /// Allocate a session for `configuration` and return its id.
    ///
    /// Fails with [`dapctl_core::Error::DebuggerNotSupported`] when no
    /// debugger handles the configuration type.
    async fn create_debug_session(
        &self,
        configuration: &DebugConfiguration,
        workspace_folder_uri: Option<&str>,
    ) -> Result<String>;

    /// Channel to the debug adapter of a created session
    async fn open_channel(&self, session_id: &str) -> Result<Channel>;

    /// Release the adapter of a session
    async fn terminate_debug_session(&self, session_id: &str) -> Result<()>;
}

/// Context for variable substitution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableResolveOptions {
    pub workspace_folder_uri: Option<String>,
    /// Settings section the value was read from, e.g. `launch`
    pub configuration_section: Option<String>,
    /// `${command:ID}` values by id
    pub command_id_variables: HashMap<String, String>,
}

/// Substitutes `${...}` variables in configuration values
#[async_trait]
pub trait VariableResolver: Send + Sync {
    /// Resolve every string in `value`. `None` means the user cancelled an
    /// interactive variable, which aborts the start.
    async fn resolve(&self, value: Value, options: &VariableResolveOptions)
        -> Result<Option<Value>>;
}
