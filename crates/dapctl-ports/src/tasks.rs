//! Task Service Port
//!
//! Runs `preLaunchTask` / `postDebugTask` entries and reports how they ended.

use async_trait::async_trait;
use dapctl_core::{Result, TaskRef};

/// A started task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub task_id: u64,
    pub label: String,
}

#[async_trait]
pub trait TaskService: Send + Sync {
    /// Start `task` in the given workspace root. `None` if the task is unknown
    /// or could not be started.
    async fn run_task(
        &self,
        workspace_folder_uri: Option<&str>,
        task: &TaskRef,
    ) -> Result<Option<TaskInfo>>;

    /// Wait for the task process to exit. `None` when it ended without an exit
    /// code (killed by a signal).
    async fn get_exit_code(&self, task_id: u64) -> Option<i32>;

    /// Wait until a background task becomes active. Never resolves for tasks
    /// that are not background tasks; `false` if the task ended without
    /// becoming active.
    async fn is_background_task_ended(&self, task_id: u64) -> bool;

    /// Signal that terminated the task, if any
    async fn get_terminate_signal(&self, task_id: u64) -> Option<String>;

    /// Open the task's definition for editing
    async fn configure(&self, workspace_folder_uri: Option<&str>, task: &TaskRef) -> Result<()>;
}
