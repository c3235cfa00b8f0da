//! Config command - inspect and check `dapctl.toml`

use crate::context::CliContext;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dapctl_config::{load_config, ConfigError};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to configuration file (defaults to the loaded one)
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}

/// Run config command
pub async fn run(ctx: &CliContext, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show(ctx),
        ConfigAction::Validate(args) => validate(ctx, args),
    }
}

fn show(ctx: &CliContext) -> Result<()> {
    match &ctx.config_path {
        Some(path) => eprintln!("# {}", path.display()),
        None => eprintln!("# defaults (no config file)"),
    }
    let content =
        toml::to_string_pretty(ctx.config.as_ref()).context("Failed to serialize configuration")?;
    print!("{content}");
    Ok(())
}

fn validate(ctx: &CliContext, args: ValidateArgs) -> Result<()> {
    let Some(path) = args.file.or_else(|| ctx.config_path.clone()) else {
        anyhow::bail!("No configuration file to validate; pass --file");
    };

    match load_config(&path) {
        Ok(config) => {
            println!("Configuration at {} is valid", path.display());
            println!(
                "  {} adapter(s), {} task(s)",
                config.adapters.len(),
                config.tasks.len()
            );
            Ok(())
        }
        Err(ConfigError::NotFound(p)) => {
            anyhow::bail!("Config file not found: {}", p.display())
        }
        Err(ConfigError::ParseError(e)) => anyhow::bail!("Parse error: {}", e),
        Err(ConfigError::ValidationError(e)) => anyhow::bail!("Validation error: {}", e),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}
