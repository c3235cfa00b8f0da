//! dapctl - debug from the command line over the Debug Adapter Protocol
//!
//! Reads launch configurations from each workspace root, starts debug
//! adapters from `dapctl.toml` and drives sessions through
//! `dapctl-application`.
//!
//! # Usage
//!
//! ```text
//! dapctl list
//! dapctl launch "Python: Current File" --break src/main.py:12
//! dapctl --workspace ../api --workspace ../web launch "Full Stack"
//! dapctl config validate
//! ```

pub mod commands;
pub mod context;
pub mod host;

use clap::{Parser, Subcommand};
use commands::config::ConfigAction;
use commands::launch::LaunchArgs;
use commands::list::ListArgs;
use context::CliContext;
use dapctl_logging::{debug, info, warn};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dapctl", version, about = "Debug Adapter Protocol client")]
pub struct Cli {
    /// Config file (defaults to $DAPCTL_CONFIG or ./dapctl.toml)
    #[arg(long, short, global = true, env = "DAPCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workspace root directory (repeatable; defaults to the current directory)
    #[arg(long, short, global = true)]
    pub workspace: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List launch configurations and compounds
    List(ListArgs),
    /// Start a configuration or compound and wait for it to end
    Launch(LaunchArgs),
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = CliContext::new(cli.config.as_deref(), cli.workspace)?;
    if let Some(log_file) = &cli.log_file {
        clean_up_logs(log_file, ctx.config.logging.log_retention_days);
    }
    match cli.command {
        Commands::List(args) => commands::list::run(&ctx, args).await,
        Commands::Launch(args) => commands::launch::run(&ctx, args).await,
        Commands::Config { action } => commands::config::run(&ctx, action).await,
    }
}

/// Delete rotated copies of `log_file` older than the retention period
fn clean_up_logs(log_file: &Path, retention_days: u32) {
    let log_dir = match log_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let Some(prefix) = log_file.file_name().and_then(|name| name.to_str()) else {
        return;
    };
    match dapctl_logging::cleanup_old_logs(log_dir, prefix, retention_days) {
        Ok(0) => debug!("No old log files to clean up"),
        Ok(n) => info!("Cleaned up {} old log file(s)", n),
        Err(e) => warn!("Failed to clean up old logs: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_launch_arguments() {
        let cli = Cli::try_parse_from([
            "dapctl",
            "--workspace",
            "/a",
            "-w",
            "/b",
            "launch",
            "Run",
            "--break",
            "main.py:3",
            "-b",
            "lib.py:7",
            "--no-debug",
        ])
        .unwrap();

        assert_eq!(cli.workspace, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        match cli.command {
            Commands::Launch(args) => {
                assert_eq!(args.name.as_deref(), Some("Run"));
                assert_eq!(args.breakpoints.len(), 2);
                assert_eq!(args.breakpoints[1].line, 7);
                assert!(args.no_debug);
            }
            _ => panic!("expected launch"),
        }
    }

    #[test]
    fn test_clean_up_logs_removes_expired_rotations() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_file = temp_dir.path().join("dapctl.log");
        let expired = temp_dir.path().join("dapctl.log.2026-01-02");
        let recent = temp_dir.path().join("dapctl.log.2026-10-15");
        let unrelated = temp_dir.path().join("other.log.2026-01-02");
        for path in [&expired, &recent, &unrelated] {
            std::fs::write(path, "log").unwrap();
        }
        let then = SystemTime::now() - Duration::from_secs(30 * 24 * 60 * 60);
        for path in [&expired, &unrelated] {
            filetime::set_file_mtime(path, filetime::FileTime::from_system_time(then)).unwrap();
        }

        clean_up_logs(&log_file, 0);
        assert!(expired.exists());

        clean_up_logs(&log_file, 7);
        assert!(!expired.exists());
        assert!(recent.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_invalid_breakpoint_is_rejected() {
        assert!(Cli::try_parse_from(["dapctl", "launch", "Run", "--break", "main.py"]).is_err());
    }
}
