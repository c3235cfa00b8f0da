//! dapctl - main entry point

use clap::Parser;
use dapctl_cli::{run, Cli};
use dapctl_logging::{debug, init, init_with_file, LogConfig};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr (or the log file) so stdout carries command output
    let log_config = LogConfig::cli(cli.debug);
    let _guard = match &cli.log_file {
        Some(path) => match init_with_file(log_config, path) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("error: cannot open log file {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            init(log_config);
            None
        }
    };
    debug!(version = env!("CARGO_PKG_VERSION"), "dapctl starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
