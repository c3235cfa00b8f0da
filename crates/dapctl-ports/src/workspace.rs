//! Workspace ports: roots, launch files and breakpoints

use async_trait::async_trait;
use dapctl_core::Result;
use dapctl_dap::SourceBreakpoint;
use serde_json::Value;

#[async_trait]
pub trait WorkspaceService: Send + Sync {
    /// Open workspace root URIs, in workspace order
    async fn roots(&self) -> Result<Vec<String>>;

    /// Root the user is working in, if any
    fn current_root(&self) -> Option<String>;
}

/// Per-root launch file access
#[async_trait]
pub trait LaunchSource: Send + Sync {
    /// Parsed launch file of `root`, `None` when the file does not exist
    async fn read(&self, root: &str) -> Result<Option<Value>>;

    /// Location of the launch file of `root`, whether or not it exists
    fn uri(&self, root: &str) -> String;

    /// Write a new launch file for `root` and return its location
    async fn create(&self, root: &str, content: &str) -> Result<String>;
}

/// Breakpoints the user set, by source URI
pub trait BreakpointSource: Send + Sync {
    fn uris(&self) -> Vec<String>;

    /// Enabled breakpoints of one source
    fn source_breakpoints(&self, uri: &str) -> Vec<SourceBreakpoint>;
}

/// Filesystem path of a `file://` URI; other strings are returned as is
pub fn uri_to_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

/// `file://` URI of a filesystem path; strings that already carry a scheme
/// are returned as is
pub fn path_to_uri(path: &str) -> String {
    if path.contains("://") {
        path.to_string()
    } else {
        format!("file://{path}")
    }
}

/// Last path segment of a root URI
pub fn folder_name(uri: &str) -> &str {
    uri_to_path(uri)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(uri)
}
