//! Port trait definitions for dapctl
//!
//! This crate contains the collaborator traits the application layer calls
//! into. The CLI implements them against the filesystem, processes and the
//! console; `dapctl-testing` implements them in memory.
//!
//! # Architecture
//!
//! Ports live outside `dapctl-application` so that the testing crate can
//! implement them without depending on the application layer.
//!
//! # Port Types
//!
//! - **Debug ports**: debugger contributions, configuration resolvers and
//!   adapter channels ([`DebugService`], [`VariableResolver`])
//! - **Workspace ports**: roots, launch files, breakpoints ([`WorkspaceService`],
//!   [`LaunchSource`], [`BreakpointSource`])
//! - **Host ports**: tasks, user messages, editors and persisted state
//!   ([`TaskService`], [`MessageService`], [`EditorService`], [`StorageService`])

mod debug;
mod host;
mod tasks;
mod workspace;

pub use debug::{DebugService, VariableResolveOptions, VariableResolver};
pub use host::{EditorService, MessageService, StorageService};
pub use tasks::{TaskInfo, TaskService};
pub use workspace::{
    folder_name, path_to_uri, uri_to_path, BreakpointSource, LaunchSource, WorkspaceService,
};

// Type aliases for convenience
use std::sync::Arc;

/// Thread-safe reference to the debug service
pub type DebugServiceRef = Arc<dyn DebugService + Send + Sync>;

/// Thread-safe reference to a variable resolver
pub type VariableResolverRef = Arc<dyn VariableResolver + Send + Sync>;

/// Thread-safe reference to the task service
pub type TaskServiceRef = Arc<dyn TaskService + Send + Sync>;

/// Thread-safe reference to the message service
pub type MessageServiceRef = Arc<dyn MessageService + Send + Sync>;

/// Thread-safe reference to the editor service
pub type EditorServiceRef = Arc<dyn EditorService + Send + Sync>;

/// Thread-safe reference to a key-value store
pub type StorageServiceRef = Arc<dyn StorageService + Send + Sync>;

/// Thread-safe reference to the workspace service
pub type WorkspaceServiceRef = Arc<dyn WorkspaceService + Send + Sync>;

/// Thread-safe reference to a launch file source
pub type LaunchSourceRef = Arc<dyn LaunchSource + Send + Sync>;

/// Thread-safe reference to a breakpoint source
pub type BreakpointSourceRef = Arc<dyn BreakpointSource + Send + Sync>;
