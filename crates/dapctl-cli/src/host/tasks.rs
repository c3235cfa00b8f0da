//! Tasks defined under `[tasks]`, run as child processes

use async_trait::async_trait;
use dapctl_config::TaskDefinition;
use dapctl_core::{Result, TaskRef};
use dapctl_logging::{debug, info, warn};
use dapctl_ports::{uri_to_path, TaskInfo, TaskService};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::process::Command;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TaskExit {
    code: Option<i32>,
    signal: Option<String>,
}

impl From<ExitStatus> for TaskExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: signal_name(&status),
        }
    }
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    let name = match status.signal()? {
        1 => "SIGHUP".to_string(),
        2 => "SIGINT".to_string(),
        3 => "SIGQUIT".to_string(),
        6 => "SIGABRT".to_string(),
        9 => "SIGKILL".to_string(),
        11 => "SIGSEGV".to_string(),
        13 => "SIGPIPE".to_string(),
        15 => "SIGTERM".to_string(),
        other => other.to_string(),
    };
    Some(name)
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> Option<String> {
    None
}

struct TaskRun {
    background: bool,
    exit: watch::Receiver<Option<TaskExit>>,
}

/// Runs configured tasks and tracks how they end.
///
/// A background task counts as ended once it is running; a regular task
/// ends when its process exits.
pub struct ProcessTaskService {
    tasks: BTreeMap<String, TaskDefinition>,
    config_path: Option<PathBuf>,
    next_id: AtomicU64,
    runs: Mutex<HashMap<u64, TaskRun>>,
}

impl ProcessTaskService {
    pub fn new(tasks: BTreeMap<String, TaskDefinition>, config_path: Option<PathBuf>) -> Self {
        Self {
            tasks,
            config_path,
            next_id: AtomicU64::new(1),
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn definition(&self, task: &TaskRef) -> Option<(&str, &TaskDefinition)> {
        let label = match task {
            TaskRef::Label(label) => label.as_str(),
            TaskRef::Identifier(identifier) => identifier.properties.get("label")?.as_str()?,
        };
        self.tasks
            .get_key_value(label)
            .map(|(label, definition)| (label.as_str(), definition))
    }

    fn run(&self, task_id: u64) -> Option<(bool, watch::Receiver<Option<TaskExit>>)> {
        let runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        runs.get(&task_id)
            .map(|run| (run.background, run.exit.clone()))
    }

    async fn wait_exit(&self, task_id: u64) -> Option<TaskExit> {
        let (_, mut exit) = self.run(task_id)?;
        let ended = exit.wait_for(Option::is_some).await.ok()?;
        ended.clone()
    }
}

fn working_dir(definition: &TaskDefinition, workspace_folder_uri: Option<&str>) -> Option<PathBuf> {
    let root = workspace_folder_uri.map(|uri| PathBuf::from(uri_to_path(uri)));
    match (&definition.cwd, root) {
        (Some(cwd), Some(root)) if cwd.is_relative() => Some(root.join(cwd)),
        (Some(cwd), _) => Some(cwd.clone()),
        (None, root) => root,
    }
}

#[async_trait]
impl TaskService for ProcessTaskService {
    async fn run_task(
        &self,
        workspace_folder_uri: Option<&str>,
        task: &TaskRef,
    ) -> Result<Option<TaskInfo>> {
        let Some((label, definition)) = self.definition(task) else {
            warn!(task = %task, "Task is not defined");
            return Ok(None);
        };

        let mut command = Command::new(&definition.command);
        command.args(&definition.args).envs(&definition.env);
        if let Some(cwd) = working_dir(definition, workspace_folder_uri) {
            command.current_dir(cwd);
        }
        let mut child = match command.kill_on_drop(true).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(task = %label, "Failed to start task: {}", e);
                return Ok(None);
            }
        };

        let task_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, exit) = watch::channel(None);
        let name = label.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    debug!(task = %name, %status, "Task exited");
                    let _ = tx.send(Some(TaskExit::from(status)));
                }
                Err(e) => {
                    warn!(task = %name, "Failed to wait for task: {}", e);
                    let _ = tx.send(Some(TaskExit {
                        code: None,
                        signal: None,
                    }));
                }
            }
        });

        info!(task = %label, task_id, background = definition.background, "Task started");
        self.runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(
                task_id,
                TaskRun {
                    background: definition.background,
                    exit,
                },
            );
        Ok(Some(TaskInfo {
            task_id,
            label: label.to_string(),
        }))
    }

    async fn get_exit_code(&self, task_id: u64) -> Option<i32> {
        match self.run(task_id) {
            Some((true, _)) => std::future::pending().await,
            Some((false, _)) => self.wait_exit(task_id).await?.code,
            None => None,
        }
    }

    async fn is_background_task_ended(&self, task_id: u64) -> bool {
        match self.run(task_id) {
            Some((true, _)) => true,
            _ => std::future::pending().await,
        }
    }

    async fn get_terminate_signal(&self, task_id: u64) -> Option<String> {
        let (_, exit) = self.run(task_id)?;
        let ended = exit.borrow();
        ended.as_ref()?.signal.clone()
    }

    async fn configure(&self, _workspace_folder_uri: Option<&str>, task: &TaskRef) -> Result<()> {
        let location = self
            .config_path
            .as_deref()
            .map(Path::display)
            .map(|path| path.to_string())
            .unwrap_or_else(|| "the config file".to_string());
        info!("Define task '{}' under [tasks] in {}", task, location);
        Ok(())
    }
}
