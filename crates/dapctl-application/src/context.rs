//! Shared debug context
//!
//! Wires the configuration manager and the session manager to one set of
//! host ports. Presentation layers build a [`DebugContext`] once per process
//! and pass it around; nothing in this crate keeps global state.
//!
//! The context does not keep the [`Config`]: values are read at construction
//! and changing them requires a new context.

use crate::configuration::DebugConfigurationManager;
use crate::ports::{
    BreakpointSourceRef, DebugServiceRef, EditorServiceRef, LaunchSourceRef, MessageServiceRef,
    StorageServiceRef, TaskServiceRef, VariableResolverRef, WorkspaceServiceRef,
};
use crate::session::{DebugSessionManager, DebugSessionSettings, SessionPorts};
use dapctl_config::Config;
use dapctl_core::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Host implementations of every port
#[derive(Clone)]
pub struct HostPorts {
    pub debug: DebugServiceRef,
    pub variables: VariableResolverRef,
    pub tasks: TaskServiceRef,
    pub messages: MessageServiceRef,
    pub editor: EditorServiceRef,
    pub storage: StorageServiceRef,
    pub workspace: WorkspaceServiceRef,
    pub launch: LaunchSourceRef,
    pub breakpoints: BreakpointSourceRef,
}

#[derive(Clone)]
pub struct DebugContext {
    /// Launch configurations of every workspace root
    pub configurations: Arc<DebugConfigurationManager>,

    /// Running debug sessions
    pub sessions: Arc<DebugSessionManager>,
}

impl DebugContext {
    pub fn new(ports: HostPorts, config: &Config) -> Self {
        let configurations = DebugConfigurationManager::new(
            ports.workspace,
            ports.launch,
            ports.debug.clone(),
            ports.editor.clone(),
            ports.storage,
            config.configuration.clone(),
        );
        let sessions = DebugSessionManager::new(
            SessionPorts {
                debug: ports.debug,
                variables: ports.variables,
                tasks: ports.tasks,
                messages: ports.messages,
                editor: ports.editor,
                breakpoints: ports.breakpoints,
            },
            configurations.clone(),
            DebugSessionSettings::from_config(config),
        );
        Self {
            configurations,
            sessions,
        }
    }

    /// Read every launch file and restore the persisted selection
    pub async fn initialize(&self) -> Result<()> {
        self.configurations.update_models().await?;
        self.configurations.load().await?;
        info!(
            roots = self.configurations.models().len(),
            options = self.configurations.all().len(),
            "Debug context ready"
        );
        Ok(())
    }

    /// Terminate every session and persist the selection
    pub async fn shutdown(&self) {
        for session in self.sessions.sessions() {
            self.sessions.terminate_session(Some(session)).await;
        }
        self.sessions.destroy_all();
        if let Err(e) = self.configurations.save().await {
            warn!("Failed to persist the launch selection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dapctl_core::DebugState;
    use dapctl_testing::fixtures::{self, ROOT_A};
    use dapctl_testing::{eventually, MockPorts};
    use std::time::Duration;

    fn host(ports: &MockPorts) -> HostPorts {
        HostPorts {
            debug: ports.debug.clone(),
            variables: ports.variables.clone(),
            tasks: ports.tasks.clone(),
            messages: ports.messages.clone(),
            editor: ports.editor.clone(),
            storage: ports.storage.clone(),
            workspace: ports.workspace.clone(),
            launch: ports.launch.clone(),
            breakpoints: ports.breakpoints.clone(),
        }
    }

    #[tokio::test]
    async fn test_context_starts_and_shuts_down() {
        let ports = MockPorts::with_roots(&[ROOT_A]);
        ports.launch.set(
            ROOT_A,
            fixtures::launch_file(&[fixtures::launch_config("Launch")], &[]),
        );
        let context = DebugContext::new(host(&ports), &Config::default());
        context.initialize().await.unwrap();

        let options = context.configurations.find("Launch", None).unwrap();
        assert!(context.sessions.start(options).await.unwrap());
        let sessions = context.sessions.clone();
        assert!(
            eventually(
                move || sessions.state() == DebugState::Running,
                Duration::from_secs(2)
            )
            .await
        );

        context.shutdown().await;
        assert!(context.sessions.sessions().is_empty());
        assert!(ports.storage.get(crate::configuration::STORAGE_KEY).is_some());
    }
}
