//! Launch configuration management across workspace roots
//!
//! The manager keeps one [`DebugConfigurationModel`] per open workspace root,
//! turns names into [`DebugSessionOptions`], tracks the current selection and
//! the recently used dynamic configurations, and persists both.
//!
//! # Lookup rules
//!
//! - `find(name, None)` searches every root in workspace order,
//!   `find(name, Some(root))` only that root
//! - configurations are matched before compounds
//! - nothing is ever guessed: an unknown name yields `None`

use super::model::DebugConfigurationModel;
use super::recent::RecentDynamicOptions;
use dapctl_config::ConfigurationConfig;
use dapctl_core::{
    CompoundMember, DebugCompound, DebugCompoundSessionOptions, DebugConfiguration,
    DebugConfigurationSessionOptions, DebugSessionOptions, Emitter, Error, Result, Subscription,
};
use dapctl_ports::{
    folder_name, DebugServiceRef, EditorServiceRef, LaunchSourceRef, StorageServiceRef,
    WorkspaceServiceRef,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Storage key of the persisted selection
pub const STORAGE_KEY: &str = "debug.configurations";

/// Content of a newly created launch file
pub const INITIAL_LAUNCH_FILE: &str = "{\n  \"version\": \"0.2.0\",\n  \"configurations\": []\n}\n";

struct ModelEntry {
    model: Arc<DebugConfigurationModel>,
    _on_change: Subscription,
}

pub struct DebugConfigurationManager {
    workspace: WorkspaceServiceRef,
    launch: LaunchSourceRef,
    debug: DebugServiceRef,
    editor: EditorServiceRef,
    storage: StorageServiceRef,
    settings: ConfigurationConfig,
    models: RwLock<Vec<ModelEntry>>,
    current: RwLock<Option<DebugSessionOptions>>,
    recent: Mutex<RecentDynamicOptions>,
    on_did_change: Emitter<()>,
    pending_update: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<Self>,
}

impl std::fmt::Debug for DebugConfigurationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugConfigurationManager")
            .field("models", &self.models().len())
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

impl DebugConfigurationManager {
    pub fn new(
        workspace: WorkspaceServiceRef,
        launch: LaunchSourceRef,
        debug: DebugServiceRef,
        editor: EditorServiceRef,
        storage: StorageServiceRef,
        settings: ConfigurationConfig,
    ) -> Arc<Self> {
        let recent = RecentDynamicOptions::new(settings.recent_dynamic_max);
        Arc::new_cyclic(|weak_self| Self {
            workspace,
            launch,
            debug,
            editor,
            storage,
            settings,
            models: RwLock::new(Vec::new()),
            current: RwLock::new(None),
            recent: Mutex::new(recent),
            on_did_change: Emitter::new(),
            pending_update: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    fn models_guard(&self) -> RwLockReadGuard<'_, Vec<ModelEntry>> {
        self.models
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn recent_guard(&self) -> MutexGuard<'_, RecentDynamicOptions> {
        self.recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Model sync
    // ========================================================================

    /// Models in workspace root order
    pub fn models(&self) -> Vec<Arc<DebugConfigurationModel>> {
        self.models_guard()
            .iter()
            .map(|entry| entry.model.clone())
            .collect()
    }

    pub fn model(&self, workspace_folder_uri: &str) -> Option<Arc<DebugConfigurationModel>> {
        self.models_guard()
            .iter()
            .find(|entry| entry.model.workspace_folder_uri() == workspace_folder_uri)
            .map(|entry| entry.model.clone())
    }

    /// Model of the current root, else the first with a launch file, else the
    /// first model
    pub fn current_model(&self) -> Option<Arc<DebugConfigurationModel>> {
        let models = self.models();
        if let Some(root) = self.workspace.current_root() {
            if let Some(model) = models.iter().find(|m| m.workspace_folder_uri() == root) {
                return Some(model.clone());
            }
        }
        models
            .iter()
            .find(|m| m.uri().is_some())
            .or_else(|| models.first())
            .cloned()
    }

    /// Create models for new roots, dispose models of removed roots, then
    /// recompute the current selection
    pub async fn update_models(&self) -> Result<()> {
        let roots = self.workspace.roots().await?;
        let (added, removed) = {
            let mut models = self
                .models
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut next = Vec::with_capacity(roots.len());
            let mut added = Vec::new();
            for root in &roots {
                match models
                    .iter()
                    .position(|entry| entry.model.workspace_folder_uri() == root)
                {
                    Some(index) => next.push(models.remove(index)),
                    None => {
                        let entry = self.create_model(root);
                        added.push(entry.model.clone());
                        next.push(entry);
                    }
                }
            }
            (added, std::mem::replace(&mut *models, next))
        };

        for entry in removed {
            debug!(root = entry.model.workspace_folder_uri(), "Disposing configuration model");
            entry.model.dispose();
        }
        for model in added {
            if let Err(e) = model.reconcile().await {
                warn!(
                    root = model.workspace_folder_uri(),
                    "Failed to read launch configurations: {}", e
                );
            }
        }
        self.refresh_current();
        Ok(())
    }

    fn create_model(&self, root: &str) -> ModelEntry {
        debug!(root, "Creating configuration model");
        let model = Arc::new(DebugConfigurationModel::new(root, self.launch.clone()));
        let manager = self.weak_self.clone();
        let on_change = model.on_did_change(move |_| {
            if let Some(manager) = manager.upgrade() {
                manager.refresh_current();
            }
        });
        ModelEntry {
            model,
            _on_change: on_change,
        }
    }

    /// Workspace roots changed; models are updated after the debounce delay.
    /// A later call restarts the delay.
    pub fn workspace_changed(&self) {
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        let delay = self.settings.debounce();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = manager.update_models().await {
                warn!("Failed to update configuration models: {}", e);
            }
        });
        let previous = self
            .pending_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// The launch file of `workspace_folder_uri` changed on disk
    pub async fn launch_changed(&self, workspace_folder_uri: &str) -> Result<()> {
        match self.model(workspace_folder_uri) {
            Some(model) => model.reconcile().await,
            None => Ok(()),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Every configuration and compound, root by root
    pub fn all(&self) -> Vec<DebugSessionOptions> {
        let mut options = Vec::new();
        for model in self.models() {
            let root = Some(model.workspace_folder_uri().to_string());
            for configuration in model.configurations() {
                options.push(DebugConfigurationSessionOptions::new(configuration, root.clone()).into());
            }
            for compound in model.compounds() {
                options.push(DebugCompoundSessionOptions::new(compound, root.clone()).into());
            }
        }
        options
    }

    /// Configurations whose debug type has a debugger, plus every compound
    pub async fn supported(&self) -> Result<Vec<DebugSessionOptions>> {
        let types: HashSet<String> = self.debug.debug_types().await?.into_iter().collect();
        Ok(self
            .all()
            .into_iter()
            .filter(|options| match options.configuration() {
                Some(configuration) => types.contains(&configuration.debug_type),
                None => true,
            })
            .collect())
    }

    fn models_for(&self, workspace_folder_uri: Option<&str>) -> Vec<Arc<DebugConfigurationModel>> {
        self.models()
            .into_iter()
            .filter(|model| {
                workspace_folder_uri.map_or(true, |root| model.workspace_folder_uri() == root)
            })
            .collect()
    }

    /// Look up a configuration, then a compound, by name
    pub fn find(&self, name: &str, workspace_folder_uri: Option<&str>) -> Option<DebugSessionOptions> {
        let models = self.models_for(workspace_folder_uri);
        for model in &models {
            if let Some(configuration) = model.find_configuration(name) {
                return Some(
                    DebugConfigurationSessionOptions::new(
                        configuration,
                        Some(model.workspace_folder_uri().to_string()),
                    )
                    .into(),
                );
            }
        }
        for model in &models {
            if let Some(compound) = model.find_compound(name) {
                return Some(
                    DebugCompoundSessionOptions::new(
                        compound,
                        Some(model.workspace_folder_uri().to_string()),
                    )
                    .into(),
                );
            }
        }
        None
    }

    /// Options for a configuration the caller already holds. A provider type
    /// marks the configuration as dynamic.
    pub fn find_configuration(
        &self,
        configuration: DebugConfiguration,
        workspace_folder_uri: Option<&str>,
        provider_type: Option<&str>,
    ) -> DebugConfigurationSessionOptions {
        let root = workspace_folder_uri.map(str::to_string);
        match provider_type {
            Some(provider_type) => {
                DebugConfigurationSessionOptions::dynamic(configuration, root, provider_type)
            }
            None => DebugConfigurationSessionOptions::new(configuration, root),
        }
    }

    pub fn find_compound(
        &self,
        compound: DebugCompound,
        workspace_folder_uri: Option<&str>,
    ) -> DebugCompoundSessionOptions {
        DebugCompoundSessionOptions::new(compound, workspace_folder_uri.map(str::to_string))
    }

    /// Resolve one member of `compound` to the configuration it names.
    ///
    /// Unqualified members are looked up in the compound's root, or in every
    /// root when the compound has none. Qualified members are looked up in the
    /// roots whose URI or folder name equals the member's folder.
    pub fn resolve_compound_member(
        &self,
        compound: &DebugCompound,
        member: &CompoundMember,
        compound_folder_uri: Option<&str>,
    ) -> Result<DebugConfigurationSessionOptions> {
        let name = member.name();
        if name == compound.name {
            return Err(Error::CompoundCycle(name.to_string()));
        }

        let candidates: Vec<Arc<DebugConfigurationModel>> = match member.folder() {
            Some(folder) => self
                .models()
                .into_iter()
                .filter(|model| {
                    let root = model.workspace_folder_uri();
                    root == folder || folder_name(root) == folder
                })
                .collect(),
            None => self.models_for(compound_folder_uri),
        };

        let mut matches = candidates.iter().filter_map(|model| {
            model
                .find_configuration(name)
                .map(|configuration| (model.workspace_folder_uri().to_string(), configuration))
        });
        let Some((root, configuration)) = matches.next() else {
            return Err(Error::ConfigurationNotFound(name.to_string()));
        };
        if matches.next().is_some() {
            return Err(Error::AmbiguousConfiguration(name.to_string()));
        }
        Ok(DebugConfigurationSessionOptions::new(configuration, Some(root)))
    }

    // ========================================================================
    // Current selection
    // ========================================================================

    pub fn current(&self) -> Option<DebugSessionOptions> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Select `options` and record dynamic selections as recently used
    pub fn set_current(&self, options: Option<DebugSessionOptions>) {
        if let Some(DebugSessionOptions::Configuration(configuration)) = &options {
            self.recent_guard().push(configuration.clone());
        }
        self.update_current(options);
    }

    fn refresh_current(&self) {
        self.update_current(self.current());
    }

    /// Validate `options` against the models. Static selections are looked up
    /// again by name, dynamic ones are kept. Without a valid selection the first
    /// configuration of the current model is selected.
    fn update_current(&self, options: Option<DebugSessionOptions>) {
        let mut selected = match options {
            Some(DebugSessionOptions::Configuration(options)) if options.is_dynamic() => {
                Some(DebugSessionOptions::Configuration(options))
            }
            Some(options) => self.find(options.name(), options.workspace_folder_uri()),
            None => None,
        };
        if selected.is_none() {
            selected = self.current_model().and_then(|model| {
                model.configurations().into_iter().next().map(|configuration| {
                    DebugConfigurationSessionOptions::new(
                        configuration,
                        Some(model.workspace_folder_uri().to_string()),
                    )
                    .into()
                })
            });
        }
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = selected;
        self.on_did_change.fire(&());
    }

    /// The current selection, ready to start. Dynamic selections are fetched
    /// again from their provider.
    pub async fn get_selected_configuration(&self) -> Result<Option<DebugSessionOptions>> {
        let Some(current) = self.current() else {
            return Ok(None);
        };
        let DebugSessionOptions::Configuration(options) = &current else {
            return Ok(Some(current));
        };
        let Some(provider_type) = options.provider_type.as_deref() else {
            return Ok(Some(current));
        };

        let fetched = self
            .debug
            .fetch_dynamic_debug_configuration(
                &options.configuration.name,
                provider_type,
                options.workspace_folder_uri.as_deref(),
            )
            .await?;
        match fetched {
            Some(configuration) => Ok(Some(
                DebugConfigurationSessionOptions {
                    configuration,
                    ..options.clone()
                }
                .into(),
            )),
            None => Err(Error::DynamicConfigurationMissing {
                provider_type: provider_type.to_string(),
                name: options.configuration.name.clone(),
            }),
        }
    }

    /// Recently used dynamic configurations, most recent first
    pub fn recent_dynamic_options(&self) -> Vec<DebugConfigurationSessionOptions> {
        self.recent_guard().entries().to_vec()
    }

    /// Configurations offered by dynamic providers, tagged with their provider
    pub async fn dynamic_configurations(&self) -> Result<Vec<DebugConfigurationSessionOptions>> {
        let root = self.workspace.current_root();
        let provided = self.debug.provide_dynamic_debug_configurations().await?;
        Ok(provided
            .into_iter()
            .flat_map(|(provider_type, configurations)| {
                let root = root.clone();
                configurations.into_iter().map(move |configuration| {
                    DebugConfigurationSessionOptions::dynamic(
                        configuration,
                        root.clone(),
                        provider_type.clone(),
                    )
                })
            })
            .collect())
    }

    pub fn on_did_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.on_did_change.on(listener)
    }

    // ========================================================================
    // Launch file
    // ========================================================================

    /// Open the launch file of the current model, creating it first when it
    /// does not exist
    pub async fn open_configuration(&self) -> Result<()> {
        let Some(model) = self.current_model() else {
            warn!("No workspace root to open a launch file for");
            return Ok(());
        };
        let uri = match model.uri() {
            Some(uri) => uri,
            None => {
                let uri = self
                    .launch
                    .create(model.workspace_folder_uri(), INITIAL_LAUNCH_FILE)
                    .await?;
                info!(%uri, "Created launch file");
                model.reconcile().await?;
                uri
            }
        };
        self.editor.open(&uri, None, None).await
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub async fn save(&self) -> Result<()> {
        let mut data = Map::new();
        if let Some(current) = self.current() {
            data.insert("current".to_string(), serde_json::to_value(current)?);
        }
        let recent = self.recent_dynamic_options();
        if !recent.is_empty() {
            data.insert(
                "recentDynamicOptions".to_string(),
                serde_json::to_value(recent)?,
            );
        }
        self.storage.set_data(STORAGE_KEY, Value::Object(data)).await
    }

    pub async fn load(&self) -> Result<()> {
        let Some(data) = self.storage.get_data(STORAGE_KEY).await? else {
            return Ok(());
        };

        if let Some(recent) = data.get("recentDynamicOptions").and_then(Value::as_array) {
            let entries = recent.iter().filter_map(|stored| match parse_stored(stored) {
                Some(DebugSessionOptions::Configuration(options)) => Some(options),
                _ => None,
            });
            self.recent_guard().set_all(entries);
        }

        if let Some(stored) = data.get("current") {
            match parse_stored(stored) {
                Some(current) => self.update_current(Some(current)),
                None => warn!("Ignoring unreadable stored debug selection: {}", stored),
            }
        }
        Ok(())
    }
}

/// Parse stored options. Records written before options carried a `name` get
/// the name of their configuration or compound.
fn parse_stored(stored: &Value) -> Option<DebugSessionOptions> {
    let mut value = stored.clone();
    if let Some(object) = value.as_object_mut() {
        if !object.contains_key("name") {
            let name = object
                .get("configuration")
                .or_else(|| object.get("compound"))
                .and_then(|nested| nested.get("name"))
                .cloned();
            if let Some(name) = name {
                object.insert("name".to_string(), name);
            }
        }
    }
    serde_json::from_value(value).ok()
}

impl Drop for DebugConfigurationManager {
    fn drop(&mut self) {
        if let Some(task) = self
            .pending_update
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            task.abort();
        }
    }
}
