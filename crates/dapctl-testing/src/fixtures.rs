//! Test fixtures and sample data factories
//!
//! Provides convenient functions to create launch configurations, compounds,
//! launch files and DAP payloads for testing.
//!
//! ```rust,ignore
//! use dapctl_testing::fixtures;
//!
//! let launch = fixtures::launch_config("Launch");
//! let file = fixtures::launch_file(&[launch], &[]);
//! ```

use dapctl_core::{
    CompoundMember, DebugCompound, DebugConfiguration, DebugConfigurationSessionOptions,
};
use dapctl_dap::{Source, StackFrame, Thread};
use serde_json::{json, Value};

/// Debug type supported by [`crate::MockDebugService`] out of the box
pub const MOCK_DEBUG_TYPE: &str = "mock";

/// Default workspace roots used across tests
pub const ROOT_A: &str = "file:///work/a";
pub const ROOT_B: &str = "file:///work/b";

/// A `launch` configuration of the mock debug type
pub fn launch_config(name: &str) -> DebugConfiguration {
    DebugConfiguration::new(MOCK_DEBUG_TYPE, name, "launch")
        .with("program", json!("${workspaceFolder}/main.py"))
}

/// An `attach` configuration of the mock debug type
pub fn attach_config(name: &str) -> DebugConfiguration {
    DebugConfiguration::new(MOCK_DEBUG_TYPE, name, "attach").with("port", json!(5678))
}

/// A compound over unqualified member names
pub fn compound(name: &str, members: &[&str]) -> DebugCompound {
    DebugCompound::new(name, members.iter().copied())
}

/// A compound member qualified with a workspace folder
pub fn qualified(name: &str, folder: &str) -> CompoundMember {
    CompoundMember::Qualified {
        name: name.to_string(),
        folder: folder.to_string(),
    }
}

/// Launch file content with the given entries
pub fn launch_file(configurations: &[DebugConfiguration], compounds: &[DebugCompound]) -> Value {
    json!({
        "version": "0.2.0",
        "configurations": configurations,
        "compounds": compounds,
    })
}

/// Options starting `configuration` in `root`
pub fn configuration_options(
    configuration: DebugConfiguration,
    root: &str,
) -> DebugConfigurationSessionOptions {
    DebugConfigurationSessionOptions::new(configuration, Some(root.to_string()))
}

pub fn sample_thread(id: i64, name: &str) -> Thread {
    Thread {
        id,
        name: name.to_string(),
    }
}

/// A frame in `path` at `line`, column 1
pub fn sample_frame(id: i64, path: &str, line: u32) -> StackFrame {
    StackFrame {
        id,
        name: format!("frame{id}"),
        source: Some(Source::from_path(path)),
        line,
        column: 1,
    }
}

/// `stopped` event body for one thread
pub fn stopped_body(thread_id: i64, reason: &str) -> Value {
    json!({"reason": reason, "threadId": thread_id})
}
