//! Mock host services
//!
//! - [`MockTaskService`] - Tasks with scripted outcomes
//! - [`MockMessageService`] - Records messages, answers errors with a preset action
//! - [`MockEditorService`] - Records saves, opens and terminal launches
//! - [`MockStorageService`] - In-memory key-value store

use async_trait::async_trait;
use dapctl_core::{Error, Result, TaskRef};
use dapctl_dap::RunInTerminalRequestArguments;
use dapctl_ports::{EditorService, MessageService, StorageService, TaskInfo, TaskService};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

// ============================================================================
// Mock Task Service
// ============================================================================

/// How a mock task ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTaskOutcome {
    /// Process exits with this code
    Exit(i32),
    /// Background task that becomes active and keeps running
    Background,
    /// Killed by a signal
    Signal(String),
    /// Ends without exit code or signal
    Vanished,
    /// The task service itself fails to start it
    Unavailable(String),
}

/// Tasks must be registered with [`MockTaskService::add_task`]; unknown labels
/// cannot be started.
#[derive(Debug, Default)]
pub struct MockTaskService {
    tasks: RwLock<HashMap<String, MockTaskOutcome>>,
    running: Mutex<HashMap<u64, MockTaskOutcome>>,
    runs: Mutex<Vec<String>>,
    configured: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl MockTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&self, label: &str, outcome: MockTaskOutcome) {
        self.tasks
            .write()
            .unwrap()
            .insert(label.to_string(), outcome);
    }

    /// Labels of started tasks, in start order
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    /// Labels passed to `configure`
    pub fn configured(&self) -> Vec<String> {
        self.configured.lock().unwrap().clone()
    }

    fn outcome(&self, task_id: u64) -> Option<MockTaskOutcome> {
        self.running.lock().unwrap().get(&task_id).cloned()
    }
}

#[async_trait]
impl TaskService for MockTaskService {
    async fn run_task(
        &self,
        _workspace_folder_uri: Option<&str>,
        task: &TaskRef,
    ) -> Result<Option<TaskInfo>> {
        let label = task.to_string();
        let Some(outcome) = self.tasks.read().unwrap().get(&label).cloned() else {
            return Ok(None);
        };
        if let MockTaskOutcome::Unavailable(reason) = outcome {
            return Err(Error::Task(reason));
        }
        let task_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.running.lock().unwrap().insert(task_id, outcome);
        self.runs.lock().unwrap().push(label.clone());
        Ok(Some(TaskInfo { task_id, label }))
    }

    async fn get_exit_code(&self, task_id: u64) -> Option<i32> {
        match self.outcome(task_id) {
            Some(MockTaskOutcome::Exit(code)) => Some(code),
            Some(MockTaskOutcome::Background) => std::future::pending().await,
            _ => None,
        }
    }

    async fn is_background_task_ended(&self, task_id: u64) -> bool {
        match self.outcome(task_id) {
            Some(MockTaskOutcome::Background) => true,
            _ => std::future::pending().await,
        }
    }

    async fn get_terminate_signal(&self, task_id: u64) -> Option<String> {
        match self.outcome(task_id) {
            Some(MockTaskOutcome::Signal(signal)) => Some(signal),
            _ => None,
        }
    }

    async fn configure(&self, _workspace_folder_uri: Option<&str>, task: &TaskRef) -> Result<()> {
        self.configured.lock().unwrap().push(task.to_string());
        Ok(())
    }
}

// ============================================================================
// Mock Message Service
// ============================================================================

#[derive(Debug, Default)]
pub struct MockMessageService {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, Vec<String>)>>,
    answer: Mutex<Option<String>>,
}

impl MockMessageService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action chosen for every later error; `None` dismisses
    pub fn answer_with(&self, action: Option<&str>) {
        *self.answer.lock().unwrap() = action.map(str::to_string);
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    /// Error texts, in order
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    /// Errors with the actions that were offered
    pub fn errors_with_actions(&self) -> Vec<(String, Vec<String>)> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageService for MockMessageService {
    async fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    async fn error(&self, message: &str, actions: &[&str]) -> Option<String> {
        self.errors.lock().unwrap().push((
            message.to_string(),
            actions.iter().map(|a| a.to_string()).collect(),
        ));
        self.answer.lock().unwrap().clone()
    }
}

// ============================================================================
// Mock Editor Service
// ============================================================================

/// A location passed to [`EditorService::open`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedLocation {
    pub uri: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

#[derive(Debug, Default)]
pub struct MockEditorService {
    saves: Mutex<Vec<bool>>,
    opened: Mutex<Vec<OpenedLocation>>,
    terminals: Mutex<Vec<RunInTerminalRequestArguments>>,
}

/// Process id reported for terminal launches
pub const MOCK_TERMINAL_PROCESS_ID: u32 = 4242;

impl MockEditorService {
    pub fn new() -> Self {
        Self::default()
    }

    /// `include_untitled` of every `save_all` call
    pub fn saves(&self) -> Vec<bool> {
        self.saves.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<OpenedLocation> {
        self.opened.lock().unwrap().clone()
    }

    pub fn terminals(&self) -> Vec<RunInTerminalRequestArguments> {
        self.terminals.lock().unwrap().clone()
    }
}

#[async_trait]
impl EditorService for MockEditorService {
    async fn save_all(&self, include_untitled: bool) -> Result<()> {
        self.saves.lock().unwrap().push(include_untitled);
        Ok(())
    }

    async fn open(&self, uri: &str, line: Option<u32>, column: Option<u32>) -> Result<()> {
        self.opened.lock().unwrap().push(OpenedLocation {
            uri: uri.to_string(),
            line,
            column,
        });
        Ok(())
    }

    async fn run_in_terminal(
        &self,
        arguments: RunInTerminalRequestArguments,
    ) -> Result<Option<u32>> {
        self.terminals.lock().unwrap().push(arguments);
        Ok(Some(MOCK_TERMINAL_PROCESS_ID))
    }
}

// ============================================================================
// Mock Storage Service
// ============================================================================

#[derive(Debug, Default)]
pub struct MockStorageService {
    data: RwLock<HashMap<String, Value>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().unwrap().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.data.write().unwrap().insert(key.to_string(), value);
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn get_data(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get(key))
    }

    async fn set_data(&self, key: &str, value: Value) -> Result<()> {
        self.set(key, value);
        Ok(())
    }
}
