//! Mock implementations for testing
//!
//! These mocks implement the port traits from `dapctl-ports` and can be used
//! in unit and integration tests.

mod debug;
mod host;
mod workspace;

pub use debug::{MockDebugService, MockVariableResolver};
pub use host::{
    MockEditorService, MockMessageService, MockStorageService, MockTaskOutcome, MockTaskService,
    OpenedLocation, MOCK_TERMINAL_PROCESS_ID,
};
pub use workspace::{MockBreakpointSource, MockLaunchSource, MockWorkspaceService};

use std::sync::Arc;

/// One mock of every port.
///
/// Keep the concrete handles to script and inspect the mocks; pass clones
/// (coerced to the `*Ref` aliases) to the components under test.
#[derive(Debug, Clone, Default)]
pub struct MockPorts {
    pub debug: Arc<MockDebugService>,
    pub variables: Arc<MockVariableResolver>,
    pub tasks: Arc<MockTaskService>,
    pub messages: Arc<MockMessageService>,
    pub editor: Arc<MockEditorService>,
    pub storage: Arc<MockStorageService>,
    pub workspace: Arc<MockWorkspaceService>,
    pub launch: Arc<MockLaunchSource>,
    pub breakpoints: Arc<MockBreakpointSource>,
}

impl MockPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mocks for a workspace with the given roots; the first root is current
    pub fn with_roots(roots: &[&str]) -> Self {
        let ports = Self::new();
        ports.workspace.set_roots(roots);
        ports.workspace.set_current_root(roots.first().copied());
        ports
    }
}
