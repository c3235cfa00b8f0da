//! List command - show the launch configurations of every root

use crate::context::CliContext;
use crate::host::StaticBreakpoints;
use anyhow::{Context, Result};
use clap::Args;
use dapctl_core::DebugSessionOptions;
use dapctl_ports::folder_name;
use serde::Serialize;

#[derive(Args)]
pub struct ListArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Include configurations whose debug type has no adapter
    #[arg(long)]
    pub all: bool,
}

/// One row of the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub name: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    pub current: bool,
}

impl ListEntry {
    fn new(options: &DebugSessionOptions, current: Option<&DebugSessionOptions>) -> Self {
        let (kind, debug_type) = match options {
            DebugSessionOptions::Configuration(options) => {
                ("configuration", Some(options.configuration.debug_type.clone()))
            }
            DebugSessionOptions::Compound(_) => ("compound", None),
        };
        Self {
            name: options.name().to_string(),
            kind,
            debug_type,
            folder: options
                .workspace_folder_uri()
                .map(|uri| folder_name(uri).to_string()),
            current: current == Some(options),
        }
    }
}

/// Collect the listing without printing it
pub async fn entries(ctx: &CliContext, all: bool) -> Result<Vec<ListEntry>> {
    let debug = ctx.debug_context(StaticBreakpoints::default());
    debug
        .initialize()
        .await
        .context("Failed to read launch configurations")?;

    let options = if all {
        debug.configurations.all()
    } else {
        debug
            .configurations
            .supported()
            .await
            .context("Failed to query debug adapters")?
    };
    let current = debug.configurations.current();
    Ok(options
        .iter()
        .map(|options| ListEntry::new(options, current.as_ref()))
        .collect())
}

/// Run list command
pub async fn run(ctx: &CliContext, args: ListArgs) -> Result<()> {
    let entries = entries(ctx, args.all).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        eprintln!("No launch configurations found.");
        return Ok(());
    }
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for entry in &entries {
        let marker = if entry.current { "*" } else { " " };
        let detail = entry.debug_type.as_deref().unwrap_or(entry.kind);
        match &entry.folder {
            Some(folder) if ctx.roots.len() > 1 => {
                println!("{marker} {:width$}  {detail}  ({folder})", entry.name)
            }
            _ => println!("{marker} {:width$}  {detail}", entry.name),
        }
    }
    Ok(())
}
