//! Mock debugger registry and variable resolver
//!
//! - [`MockDebugService`] - Registered debug types, scripted resolvers, one
//!   [`ScriptedAdapter`] per created session
//! - [`MockVariableResolver`] - Substitutes a small set of variables

use crate::adapter::{AdapterScript, ScriptedAdapter};
use crate::fixtures::MOCK_DEBUG_TYPE;
use async_trait::async_trait;
use dapctl_core::{DebugConfiguration, Error, Resolution, Result};
use dapctl_dap::Channel;
use dapctl_ports::{uri_to_path, DebugService, VariableResolveOptions, VariableResolver};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

// ============================================================================
// Mock Debug Service
// ============================================================================

/// A mock debug service for testing
///
/// Only [`MOCK_DEBUG_TYPE`] is supported unless more types are registered.
/// Each created session gets a [`ScriptedAdapter`] driven by the script
/// registered for its debug type.
#[derive(Debug)]
pub struct MockDebugService {
    debug_types: RwLock<Vec<String>>,
    scripts: RwLock<HashMap<String, AdapterScript>>,
    dynamic: RwLock<BTreeMap<String, Vec<DebugConfiguration>>>,
    /// First-pass outcomes by configuration name
    resolutions: RwLock<HashMap<String, Resolution<()>>>,
    /// Second-pass outcomes by configuration name
    substituted_resolutions: RwLock<HashMap<String, Resolution<()>>>,
    debugger_variables: RwLock<HashMap<String, HashMap<String, String>>>,
    channels: Mutex<HashMap<String, Channel>>,
    adapters: Mutex<Vec<(String, Arc<ScriptedAdapter>)>>,
    created: Mutex<Vec<DebugConfiguration>>,
    resolved: Mutex<Vec<DebugConfiguration>>,
    terminated: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl Default for MockDebugService {
    fn default() -> Self {
        Self {
            debug_types: RwLock::new(vec![MOCK_DEBUG_TYPE.to_string()]),
            scripts: RwLock::new(HashMap::new()),
            dynamic: RwLock::new(BTreeMap::new()),
            resolutions: RwLock::new(HashMap::new()),
            substituted_resolutions: RwLock::new(HashMap::new()),
            debugger_variables: RwLock::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            adapters: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            resolved: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MockDebugService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register another supported debug type
    pub fn add_debug_type(&self, debug_type: &str) {
        self.debug_types.write().unwrap().push(debug_type.to_string());
    }

    /// Script used for sessions of `debug_type`
    pub fn set_script(&self, debug_type: &str, script: AdapterScript) {
        self.scripts
            .write()
            .unwrap()
            .insert(debug_type.to_string(), script);
    }

    /// Offer a configuration from the dynamic provider `provider_type`
    pub fn add_dynamic(&self, provider_type: &str, configuration: DebugConfiguration) {
        self.dynamic
            .write()
            .unwrap()
            .entry(provider_type.to_string())
            .or_default()
            .push(configuration);
    }

    pub fn clear_dynamic(&self) {
        self.dynamic.write().unwrap().clear();
    }

    /// Outcome of the first resolver pass for the configuration `name`
    pub fn set_resolution(&self, name: &str, resolution: Resolution<()>) {
        self.resolutions
            .write()
            .unwrap()
            .insert(name.to_string(), resolution);
    }

    /// Outcome of the second resolver pass for the configuration `name`
    pub fn set_substituted_resolution(&self, name: &str, resolution: Resolution<()>) {
        self.substituted_resolutions
            .write()
            .unwrap()
            .insert(name.to_string(), resolution);
    }

    pub fn set_debugger_variables(&self, debug_type: &str, variables: HashMap<String, String>) {
        self.debugger_variables
            .write()
            .unwrap()
            .insert(debug_type.to_string(), variables);
    }

    /// Adapter of a created session
    pub fn adapter(&self, session_id: &str) -> Option<Arc<ScriptedAdapter>> {
        self.adapters
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == session_id)
            .map(|(_, adapter)| adapter.clone())
    }

    /// Adapters of every created session, in creation order
    pub fn adapters(&self) -> Vec<(String, Arc<ScriptedAdapter>)> {
        self.adapters.lock().unwrap().clone()
    }

    /// Configurations sessions were created for, in creation order
    pub fn created(&self) -> Vec<DebugConfiguration> {
        self.created.lock().unwrap().clone()
    }

    /// Configurations seen by the second resolver pass
    pub fn resolved(&self) -> Vec<DebugConfiguration> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }

    fn outcome(
        table: &RwLock<HashMap<String, Resolution<()>>>,
        configuration: DebugConfiguration,
    ) -> Resolution<DebugConfiguration> {
        match table.read().unwrap().get(&configuration.name) {
            Some(resolution) => resolution.clone().map(|_| configuration),
            None => Resolution::Resolved(configuration),
        }
    }
}

#[async_trait]
impl DebugService for MockDebugService {
    async fn debug_types(&self) -> Result<Vec<String>> {
        Ok(self.debug_types.read().unwrap().clone())
    }

    async fn provide_dynamic_debug_configurations(
        &self,
    ) -> Result<BTreeMap<String, Vec<DebugConfiguration>>> {
        Ok(self.dynamic.read().unwrap().clone())
    }

    async fn fetch_dynamic_debug_configuration(
        &self,
        name: &str,
        provider_type: &str,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<Option<DebugConfiguration>> {
        Ok(self
            .dynamic
            .read()
            .unwrap()
            .get(provider_type)
            .and_then(|configurations| configurations.iter().find(|c| c.name == name))
            .cloned())
    }

    async fn resolve_debug_configuration(
        &self,
        configuration: DebugConfiguration,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<Resolution<DebugConfiguration>> {
        Ok(Self::outcome(&self.resolutions, configuration))
    }

    async fn resolve_debug_configuration_with_substituted_variables(
        &self,
        configuration: DebugConfiguration,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<Resolution<DebugConfiguration>> {
        self.resolved.lock().unwrap().push(configuration.clone());
        Ok(Self::outcome(&self.substituted_resolutions, configuration))
    }

    async fn provide_debugger_variables(
        &self,
        debug_type: &str,
    ) -> Result<HashMap<String, String>> {
        Ok(self
            .debugger_variables
            .read()
            .unwrap()
            .get(debug_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_debug_session(
        &self,
        configuration: &DebugConfiguration,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<String> {
        if !self
            .debug_types
            .read()
            .unwrap()
            .contains(&configuration.debug_type)
        {
            return Err(Error::DebuggerNotSupported(configuration.debug_type.clone()));
        }

        let session_id = format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let script = self
            .scripts
            .read()
            .unwrap()
            .get(&configuration.debug_type)
            .cloned()
            .unwrap_or_default();
        let (channel, adapter) = ScriptedAdapter::start(script);

        self.channels
            .lock()
            .unwrap()
            .insert(session_id.clone(), channel);
        self.adapters
            .lock()
            .unwrap()
            .push((session_id.clone(), Arc::new(adapter)));
        self.created.lock().unwrap().push(configuration.clone());
        Ok(session_id)
    }

    async fn open_channel(&self, session_id: &str) -> Result<Channel> {
        self.channels
            .lock()
            .unwrap()
            .remove(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    async fn terminate_debug_session(&self, session_id: &str) -> Result<()> {
        self.terminated
            .lock()
            .unwrap()
            .push(session_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Mock Variable Resolver
// ============================================================================

/// Substitutes `${workspaceFolder}` and `${command:ID}`; everything else is
/// left untouched
#[derive(Debug, Default)]
pub struct MockVariableResolver {
    abort: AtomicBool,
    calls: Mutex<Vec<VariableResolveOptions>>,
}

impl MockVariableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every resolution return `None`
    pub fn set_abort(&self, abort: bool) {
        self.abort.store(abort, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<VariableResolveOptions> {
        self.calls.lock().unwrap().clone()
    }

    fn substitute(value: Value, options: &VariableResolveOptions) -> Value {
        match value {
            Value::String(text) => {
                let mut text = text;
                if let Some(root) = &options.workspace_folder_uri {
                    text = text.replace("${workspaceFolder}", uri_to_path(root));
                }
                for (id, resolved) in &options.command_id_variables {
                    text = text.replace(&format!("${{command:{id}}}"), resolved);
                }
                Value::String(text)
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| Self::substitute(item, options))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Self::substitute(item, options)))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[async_trait]
impl VariableResolver for MockVariableResolver {
    async fn resolve(
        &self,
        value: Value,
        options: &VariableResolveOptions,
    ) -> Result<Option<Value>> {
        self.calls.lock().unwrap().push(options.clone());
        if self.abort.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(Self::substitute(value, options)))
    }
}
