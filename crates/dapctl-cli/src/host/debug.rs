//! Debug adapters configured in `[adapters]`

use async_trait::async_trait;
use dapctl_config::{AdapterCommand, ConnectionConfig};
use dapctl_core::{DebugConfiguration, Error, Resolution, Result};
use dapctl_dap::{open_adapter_channel, Channel};
use dapctl_logging::{debug, info};
use dapctl_ports::DebugService;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

/// Spawns or connects to the adapter registered for a configuration's type.
///
/// The adapter is reached when the session is created; the channel waits
/// until [`DebugService::open_channel`] hands it to the session.
pub struct ProcessDebugService {
    adapters: BTreeMap<String, AdapterCommand>,
    connection: ConnectionConfig,
    pending: Mutex<HashMap<String, Channel>>,
}

impl ProcessDebugService {
    pub fn new(adapters: BTreeMap<String, AdapterCommand>, connection: ConnectionConfig) -> Self {
        Self {
            adapters,
            connection,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, Channel>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DebugService for ProcessDebugService {
    async fn debug_types(&self) -> Result<Vec<String>> {
        Ok(self.adapters.keys().cloned().collect())
    }

    async fn provide_dynamic_debug_configurations(
        &self,
    ) -> Result<BTreeMap<String, Vec<DebugConfiguration>>> {
        Ok(BTreeMap::new())
    }

    async fn fetch_dynamic_debug_configuration(
        &self,
        _name: &str,
        _provider_type: &str,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<Option<DebugConfiguration>> {
        Ok(None)
    }

    async fn resolve_debug_configuration(
        &self,
        configuration: DebugConfiguration,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<Resolution<DebugConfiguration>> {
        Ok(Resolution::Resolved(configuration))
    }

    async fn resolve_debug_configuration_with_substituted_variables(
        &self,
        configuration: DebugConfiguration,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<Resolution<DebugConfiguration>> {
        Ok(Resolution::Resolved(configuration))
    }

    async fn provide_debugger_variables(
        &self,
        _debug_type: &str,
    ) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn create_debug_session(
        &self,
        configuration: &DebugConfiguration,
        _workspace_folder_uri: Option<&str>,
    ) -> Result<String> {
        let adapter = self
            .adapters
            .get(&configuration.debug_type)
            .ok_or_else(|| Error::DebuggerNotSupported(configuration.debug_type.clone()))?;
        let channel = open_adapter_channel(adapter, &self.connection).await?;

        let session_id = Uuid::new_v4().to_string();
        info!(%session_id, debug_type = %configuration.debug_type, "Adapter ready");
        self.pending().insert(session_id.clone(), channel);
        Ok(session_id)
    }

    async fn open_channel(&self, session_id: &str) -> Result<Channel> {
        self.pending()
            .remove(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    async fn terminate_debug_session(&self, session_id: &str) -> Result<()> {
        // Channels already handed out are closed by their connection
        if self.pending().remove(session_id).is_some() {
            debug!(%session_id, "Dropped unopened adapter channel");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_type_is_not_supported() {
        let service = ProcessDebugService::new(BTreeMap::new(), ConnectionConfig::default());
        let configuration = DebugConfiguration::new("python", "Run", "launch");

        let err = service
            .create_debug_session(&configuration, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DebuggerNotSupported(t) if t == "python"));
    }

    #[tokio::test]
    async fn test_debug_types_follow_adapters() {
        let mut adapters = BTreeMap::new();
        adapters.insert(
            "python".to_string(),
            AdapterCommand {
                command: Some("python3".into()),
                ..Default::default()
            },
        );
        let service = ProcessDebugService::new(adapters, ConnectionConfig::default());
        assert_eq!(service.debug_types().await.unwrap(), vec!["python"]);
    }

    #[tokio::test]
    async fn test_open_unknown_session_fails() {
        let service = ProcessDebugService::new(BTreeMap::new(), ConnectionConfig::default());
        assert!(matches!(
            service.open_channel("nope").await,
            Err(Error::SessionNotFound(_))
        ));
        service.terminate_debug_session("nope").await.unwrap();
    }
}
