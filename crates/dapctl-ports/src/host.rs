//! Host ports: user messages, editors and persisted state

use async_trait::async_trait;
use dapctl_core::Result;
use dapctl_dap::RunInTerminalRequestArguments;
use serde_json::Value;

/// User-facing notifications
#[async_trait]
pub trait MessageService: Send + Sync {
    async fn info(&self, message: &str);

    /// Show an error with optional actions and wait for the answer.
    /// `None` when dismissed without choosing an action.
    async fn error(&self, message: &str, actions: &[&str]) -> Option<String>;
}

#[async_trait]
pub trait EditorService: Send + Sync {
    /// Save dirty editors; untitled ones only when `include_untitled`
    async fn save_all(&self, include_untitled: bool) -> Result<()>;

    /// Reveal a location. Lines and columns are 1-based.
    async fn open(&self, uri: &str, line: Option<u32>, column: Option<u32>) -> Result<()>;

    /// Run a command in a terminal on behalf of an adapter.
    /// Returns the process id when known.
    async fn run_in_terminal(&self, arguments: RunInTerminalRequestArguments)
        -> Result<Option<u32>>;
}

/// Persistent key-value store
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn get_data(&self, key: &str) -> Result<Option<Value>>;

    async fn set_data(&self, key: &str, value: Value) -> Result<()>;
}
