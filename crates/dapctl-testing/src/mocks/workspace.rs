//! Mock workspace services
//!
//! - [`MockWorkspaceService`] - Mutable list of roots
//! - [`MockLaunchSource`] - In-memory launch files
//! - [`MockBreakpointSource`] - In-memory breakpoints

use async_trait::async_trait;
use dapctl_core::{Error, Result};
use dapctl_dap::SourceBreakpoint;
use dapctl_ports::{BreakpointSource, LaunchSource, WorkspaceService};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

// ============================================================================
// Mock Workspace Service
// ============================================================================

#[derive(Debug, Default)]
pub struct MockWorkspaceService {
    roots: RwLock<Vec<String>>,
    current: RwLock<Option<String>>,
}

impl MockWorkspaceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots(roots: &[&str]) -> Self {
        let service = Self::new();
        service.set_roots(roots);
        service
    }

    pub fn set_roots(&self, roots: &[&str]) {
        *self.roots.write().unwrap() = roots.iter().map(|r| r.to_string()).collect();
    }

    pub fn set_current_root(&self, root: Option<&str>) {
        *self.current.write().unwrap() = root.map(str::to_string);
    }
}

#[async_trait]
impl WorkspaceService for MockWorkspaceService {
    async fn roots(&self) -> Result<Vec<String>> {
        Ok(self.roots.read().unwrap().clone())
    }

    fn current_root(&self) -> Option<String> {
        self.current.read().unwrap().clone()
    }
}

// ============================================================================
// Mock Launch Source
// ============================================================================

/// Launch files keyed by root. Locations are `<root>/.dapctl/launch.json`.
#[derive(Debug, Default)]
pub struct MockLaunchSource {
    files: RwLock<HashMap<String, Value>>,
    created: Mutex<Vec<String>>,
}

impl MockLaunchSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, root: &str, content: Value) {
        self.files
            .write()
            .unwrap()
            .insert(root.to_string(), content);
    }

    pub fn remove(&self, root: &str) {
        self.files.write().unwrap().remove(root);
    }

    pub fn get(&self, root: &str) -> Option<Value> {
        self.files.read().unwrap().get(root).cloned()
    }

    /// Roots whose launch file was created through [`LaunchSource::create`]
    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl LaunchSource for MockLaunchSource {
    async fn read(&self, root: &str) -> Result<Option<Value>> {
        Ok(self.get(root))
    }

    fn uri(&self, root: &str) -> String {
        format!("{}/.dapctl/launch.json", root.trim_end_matches('/'))
    }

    async fn create(&self, root: &str, content: &str) -> Result<String> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        self.set(root, value);
        self.created.lock().unwrap().push(root.to_string());
        Ok(self.uri(root))
    }
}

// ============================================================================
// Mock Breakpoint Source
// ============================================================================

#[derive(Debug, Default)]
pub struct MockBreakpointSource {
    breakpoints: RwLock<BTreeMap<String, Vec<SourceBreakpoint>>>,
}

impl MockBreakpointSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the breakpoints of `uri` with one per line
    pub fn set_lines(&self, uri: &str, lines: &[u32]) {
        self.breakpoints.write().unwrap().insert(
            uri.to_string(),
            lines.iter().map(|line| SourceBreakpoint::at_line(*line)).collect(),
        );
    }
}

impl BreakpointSource for MockBreakpointSource {
    fn uris(&self) -> Vec<String> {
        self.breakpoints.read().unwrap().keys().cloned().collect()
    }

    fn source_breakpoints(&self, uri: &str) -> Vec<SourceBreakpoint> {
        self.breakpoints
            .read()
            .unwrap()
            .get(uri)
            .cloned()
            .unwrap_or_default()
    }
}
