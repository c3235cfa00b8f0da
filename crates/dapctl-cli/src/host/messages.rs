//! User messages on the console

use async_trait::async_trait;
use dapctl_logging::{error, info};
use dapctl_ports::MessageService;

/// Prints messages to stderr. It never prompts, so every error dialog is
/// dismissed with no action chosen.
#[derive(Debug, Clone, Default)]
pub struct ConsoleMessages;

#[async_trait]
impl MessageService for ConsoleMessages {
    async fn info(&self, message: &str) {
        info!("{}", message);
        eprintln!("{message}");
    }

    async fn error(&self, message: &str, actions: &[&str]) -> Option<String> {
        error!(actions = ?actions, "{}", message);
        eprintln!("error: {message}");
        None
    }
}
