//! Test utilities for dapctl
//!
//! This crate provides mocks, a scripted debug adapter and fixtures for testing
//! dapctl components.
//!
//! # Mocks
//!
//! - [`MockDebugService`] - Debugger registry backed by [`ScriptedAdapter`]s
//! - [`MockVariableResolver`] - `${workspaceFolder}` / `${command:...}` substitution
//! - [`MockTaskService`] - Tasks with scripted outcomes
//! - [`MockMessageService`] - Records messages, answers with a preset action
//! - [`MockEditorService`] - Records saves, opens and terminal launches
//! - [`MockStorageService`] - In-memory key-value store
//! - [`MockWorkspaceService`] - Mutable list of roots
//! - [`MockLaunchSource`] - In-memory launch files
//! - [`MockBreakpointSource`] - In-memory breakpoints
//! - [`MockPorts`] - One of each, wired together
//!
//! # Scripted adapter
//!
//! [`ScriptedAdapter`] answers DAP requests over an in-memory channel
//! according to an [`AdapterScript`] and records what it received.
//! [`eventually`] polls for state that settles in background tasks.
//!
//! # Usage
//!
//! ```no_run
//! use dapctl_dap::{Command, DebugSessionConnection};
//! use dapctl_testing::{AdapterScript, ScriptedAdapter};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (channel, adapter) = ScriptedAdapter::start(AdapterScript::default());
//! let connection = DebugSessionConnection::new("session-1", channel, None);
//! connection.send_request(Command::Threads, json!(null)).await?;
//! assert_eq!(adapter.commands(), vec!["threads"]);
//! # Ok(())
//! # }
//! ```

mod adapter;
pub mod fixtures;
mod mocks;
pub mod proptest_config;
mod wait;

pub use adapter::{AdapterScript, ScriptedAdapter, ScriptedReply};
pub use mocks::{
    MockBreakpointSource, MockDebugService, MockEditorService, MockLaunchSource,
    MockMessageService, MockPorts, MockStorageService, MockTaskOutcome, MockTaskService,
    MockVariableResolver, MockWorkspaceService, OpenedLocation, MOCK_TERMINAL_PROCESS_ID,
};
pub use wait::eventually;
