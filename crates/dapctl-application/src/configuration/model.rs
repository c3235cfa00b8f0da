//! Launch configurations of one workspace root

use dapctl_core::{DebugCompound, DebugConfiguration, Emitter, Result, Subscription};
use dapctl_ports::LaunchSourceRef;
use serde_json::Value;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct ModelState {
    /// Location of the launch file, when it exists
    uri: Option<String>,
    configurations: Vec<DebugConfiguration>,
    compounds: Vec<DebugCompound>,
}

/// Parsed launch file of one workspace root.
///
/// [`DebugConfigurationModel::reconcile`] re-reads the file; every reconcile
/// fires the change event, even when nothing changed.
pub struct DebugConfigurationModel {
    workspace_folder_uri: String,
    source: LaunchSourceRef,
    state: RwLock<ModelState>,
    on_did_change: Emitter<()>,
}

impl std::fmt::Debug for DebugConfigurationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugConfigurationModel")
            .field("workspace_folder_uri", &self.workspace_folder_uri)
            .field("state", &*self.state())
            .finish()
    }
}

impl DebugConfigurationModel {
    pub fn new(workspace_folder_uri: impl Into<String>, source: LaunchSourceRef) -> Self {
        Self {
            workspace_folder_uri: workspace_folder_uri.into(),
            source,
            state: RwLock::new(ModelState::default()),
            on_did_change: Emitter::new(),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, ModelState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn workspace_folder_uri(&self) -> &str {
        &self.workspace_folder_uri
    }

    /// Launch file location, `None` while the file does not exist
    pub fn uri(&self) -> Option<String> {
        self.state().uri.clone()
    }

    pub fn configurations(&self) -> Vec<DebugConfiguration> {
        self.state().configurations.clone()
    }

    pub fn compounds(&self) -> Vec<DebugCompound> {
        self.state().compounds.clone()
    }

    pub fn find_configuration(&self, name: &str) -> Option<DebugConfiguration> {
        self.state()
            .configurations
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn find_compound(&self, name: &str) -> Option<DebugCompound> {
        self.state().compounds.iter().find(|c| c.name == name).cloned()
    }

    /// Re-read the launch file and notify listeners
    pub async fn reconcile(&self) -> Result<()> {
        let content = self.source.read(&self.workspace_folder_uri).await?;
        let uri = content
            .as_ref()
            .map(|_| self.source.uri(&self.workspace_folder_uri));
        let (configurations, compounds) = content.as_ref().map(parse).unwrap_or_default();
        debug!(
            root = %self.workspace_folder_uri,
            configurations = configurations.len(),
            compounds = compounds.len(),
            "Launch configurations reconciled"
        );

        {
            let mut state = self
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.uri = uri;
            state.configurations = configurations;
            state.compounds = compounds;
        }
        self.on_did_change.fire(&());
        Ok(())
    }

    pub fn on_did_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.on_did_change.on(listener)
    }

    pub fn dispose(&self) {
        self.on_did_change.dispose();
    }
}

/// Split a launch file into its configurations and compounds, skipping
/// entries that are not well formed
pub fn parse(content: &Value) -> (Vec<DebugConfiguration>, Vec<DebugCompound>) {
    let configurations = entries(content, "configurations")
        .filter_map(|entry| {
            let configuration = DebugConfiguration::from_value(entry);
            if configuration.is_none() {
                warn!("Skipping invalid launch configuration: {}", entry);
            }
            configuration
        })
        .collect();
    let compounds = entries(content, "compounds")
        .filter_map(DebugCompound::from_value)
        .collect();
    (configurations, compounds)
}

fn entries<'a>(content: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    content
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dapctl_testing::{fixtures, MockLaunchSource};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parse_skips_invalid_entries() {
        let content = json!({
            "configurations": [
                {"type": "mock", "name": "Launch", "request": "launch"},
                {"name": "no type", "request": "launch"},
                "not an object"
            ],
            "compounds": [
                {"name": "All", "configurations": ["Launch"]},
                {"configurations": ["Launch"]}
            ]
        });
        let (configurations, compounds) = parse(&content);
        assert_eq!(configurations.len(), 1);
        assert_eq!(configurations[0].name, "Launch");
        assert_eq!(compounds.len(), 1);
        assert_eq!(compounds[0].name, "All");
    }

    #[test]
    fn test_parse_missing_lists() {
        let (configurations, compounds) = parse(&json!({"version": "0.2.0"}));
        assert!(configurations.is_empty());
        assert!(compounds.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_reads_source_and_fires() {
        let source = Arc::new(MockLaunchSource::new());
        source.set(
            fixtures::ROOT_A,
            fixtures::launch_file(&[fixtures::launch_config("Launch")], &[]),
        );
        let model = DebugConfigurationModel::new(fixtures::ROOT_A, source.clone());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _sub = model.on_did_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        model.reconcile().await.unwrap();
        assert_eq!(model.configurations().len(), 1);
        assert_eq!(
            model.uri().as_deref(),
            Some("file:///work/a/.dapctl/launch.json")
        );
        assert!(model.find_configuration("Launch").is_some());
        assert!(model.find_compound("Launch").is_none());

        source.remove(fixtures::ROOT_A);
        model.reconcile().await.unwrap();
        assert!(model.configurations().is_empty());
        assert!(model.uri().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
