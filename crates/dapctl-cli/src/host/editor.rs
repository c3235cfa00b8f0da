//! Editor operations without an editor: log them, run terminals as processes

use async_trait::async_trait;
use dapctl_core::{Error, Result};
use dapctl_dap::RunInTerminalRequestArguments;
use dapctl_logging::{debug, info};
use dapctl_ports::{uri_to_path, EditorService};
use serde_json::Value;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct ConsoleEditor;

#[async_trait]
impl EditorService for ConsoleEditor {
    async fn save_all(&self, include_untitled: bool) -> Result<()> {
        debug!(include_untitled, "Nothing to save");
        Ok(())
    }

    async fn open(&self, uri: &str, line: Option<u32>, column: Option<u32>) -> Result<()> {
        let path = uri_to_path(uri);
        match (line, column) {
            (Some(line), Some(column)) => eprintln!("at {path}:{line}:{column}"),
            (Some(line), None) => eprintln!("at {path}:{line}"),
            _ => eprintln!("see {path}"),
        }
        Ok(())
    }

    async fn run_in_terminal(
        &self,
        arguments: RunInTerminalRequestArguments,
    ) -> Result<Option<u32>> {
        let Some((program, args)) = arguments.args.split_first() else {
            return Err(Error::InvalidConfig(
                "runInTerminal request without a command".to_string(),
            ));
        };
        let mut command = Command::new(program);
        command.args(args);
        if !arguments.cwd.is_empty() {
            command.current_dir(&arguments.cwd);
        }
        for (key, value) in arguments.env.iter().flatten() {
            match value {
                Value::Null => {
                    command.env_remove(key);
                }
                Value::String(value) => {
                    command.env(key, value);
                }
                other => {
                    command.env(key, other.to_string());
                }
            }
        }

        let mut child = command.spawn()?;
        let pid = child.id();
        info!(?pid, program = %program, title = ?arguments.title, "Started debuggee in terminal");
        tokio::spawn(async move {
            if let Ok(status) = child.wait().await {
                debug!(?pid, %status, "Terminal process exited");
            }
        });
        Ok(pid)
    }
}
