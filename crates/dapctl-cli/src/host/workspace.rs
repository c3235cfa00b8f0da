//! Workspace roots and launch files on the local filesystem

use async_trait::async_trait;
use dapctl_config::paths::{ensure_parent_dir, launch_file_path};
use dapctl_core::{Error, Result};
use dapctl_logging::{debug, error, trace, warn};
use dapctl_ports::{path_to_uri, uri_to_path, LaunchSource, WorkspaceService};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// `file://` URI of a workspace directory
pub fn root_uri(path: &Path) -> String {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    path_to_uri(&path.to_string_lossy())
}

/// Roots fixed at startup; the first one is current
#[derive(Debug, Clone)]
pub struct StaticWorkspace {
    roots: Vec<String>,
}

impl StaticWorkspace {
    pub fn new(roots: Vec<String>) -> Self {
        Self { roots }
    }

    pub fn from_paths(paths: &[PathBuf]) -> Self {
        Self::new(paths.iter().map(|path| root_uri(path)).collect())
    }
}

#[async_trait]
impl WorkspaceService for StaticWorkspace {
    async fn roots(&self) -> Result<Vec<String>> {
        Ok(self.roots.clone())
    }

    fn current_root(&self) -> Option<String> {
        self.roots.first().cloned()
    }
}

/// Launch files at a fixed path below each root
#[derive(Debug, Clone)]
pub struct FsLaunchSource {
    launch_file: String,
}

impl FsLaunchSource {
    pub fn new(launch_file: impl Into<String>) -> Self {
        Self {
            launch_file: launch_file.into(),
        }
    }

    pub fn path(&self, root: &str) -> PathBuf {
        launch_file_path(Path::new(uri_to_path(root)), &self.launch_file)
    }
}

#[async_trait]
impl LaunchSource for FsLaunchSource {
    async fn read(&self, root: &str) -> Result<Option<Value>> {
        let path = self.path(root);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    fn uri(&self, root: &str) -> String {
        path_to_uri(&self.path(root).to_string_lossy())
    }

    async fn create(&self, root: &str, content: &str) -> Result<String> {
        let path = self.path(root);
        ensure_parent_dir(&path)?;
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), "Wrote launch file");
        Ok(self.uri(root))
    }
}

/// Watches the launch files of every root and reports the root whose file
/// changed. Dropping the watcher stops watching.
pub struct LaunchWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl LaunchWatcher {
    /// Returns the watcher and a stream of changed root URIs
    pub fn start(
        roots: &[String],
        source: &FsLaunchSource,
        debounce: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watched: Vec<(PathBuf, String)> = roots
            .iter()
            .map(|root| (source.path(root), root.clone()))
            .collect();
        let routes = watched.clone();

        let mut debouncer = new_debouncer(
            debounce,
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        trace!(path = %event.path.display(), "Launch file event");
                        let changed = routes
                            .iter()
                            .filter(|(file, _)| event.path == *file || file.starts_with(&event.path));
                        for (_, root) in changed {
                            let _ = tx.send(root.clone());
                        }
                    }
                }
                Err(e) => error!("Launch file watcher error: {}", e),
            },
        )
        .map_err(|e| Error::InvalidConfig(format!("Failed to create file watcher: {}", e)))?;

        for (file, root) in &watched {
            // Watch the root so launch files created later are seen too
            let directory = Path::new(uri_to_path(root));
            if let Err(e) = debouncer
                .watcher()
                .watch(directory, RecursiveMode::Recursive)
            {
                warn!(root = %root, "Cannot watch {}: {}", file.display(), e);
            }
        }
        Ok((
            Self {
                _debouncer: debouncer,
            },
            rx,
        ))
    }
}
