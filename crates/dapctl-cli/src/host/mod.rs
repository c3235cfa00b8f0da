//! Host port implementations for the command line
//!
//! Adapters come from `[adapters]`, tasks from `[tasks]`, launch files from
//! the workspace roots and persisted state from one JSON file.

mod breakpoints;
mod debug;
mod editor;
mod messages;
mod storage;
mod tasks;
mod variables;
mod workspace;

pub use breakpoints::{BreakpointParseError, BreakpointSpec, StaticBreakpoints};
pub use debug::ProcessDebugService;
pub use editor::ConsoleEditor;
pub use messages::ConsoleMessages;
pub use storage::FileStorage;
pub use tasks::ProcessTaskService;
pub use variables::EnvVariableResolver;
pub use workspace::{root_uri, FsLaunchSource, LaunchWatcher, StaticWorkspace};
