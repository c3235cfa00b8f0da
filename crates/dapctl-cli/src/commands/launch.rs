//! Launch command - start a configuration and stay attached until it ends

use crate::context::CliContext;
use crate::host::{BreakpointSpec, StaticBreakpoints};
use anyhow::{Context, Result};
use clap::Args;
use dapctl_application::DebugContext;
use dapctl_core::DebugSessionOptions;
use dapctl_logging::{debug, info, warn};
use dapctl_ports::folder_name;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How often the session list is re-checked while attached
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Args)]
pub struct LaunchArgs {
    /// Configuration or compound name (defaults to the last one started)
    pub name: Option<String>,

    /// Workspace folder name or path to look the name up in
    #[arg(long)]
    pub folder: Option<String>,

    /// Line breakpoint as PATH:LINE, relative to the first root (repeatable)
    #[arg(long = "break", short = 'b', value_name = "PATH:LINE")]
    pub breakpoints: Vec<BreakpointSpec>,

    /// Run without debugging
    #[arg(long)]
    pub no_debug: bool,
}

/// Run launch command
pub async fn run(ctx: &CliContext, args: LaunchArgs) -> Result<()> {
    let base = ctx.roots.first().cloned().unwrap_or_default();
    let debug = ctx.debug_context(StaticBreakpoints::new(&args.breakpoints, &base));
    debug
        .initialize()
        .await
        .context("Failed to read launch configurations")?;

    let options = select(ctx, &debug, &args).await?;
    let (_watcher, mut launch_changes) = ctx
        .watch_launch_files()
        .context("Failed to watch launch files")?;

    let ended = Arc::new(Notify::new());
    let _destroyed = debug.sessions.on_did_destroy_debug_session({
        let ended = ended.clone();
        move |session| {
            debug!(session = session.id(), "Session destroyed");
            ended.notify_one();
        }
    });

    info!(name = options.name(), "Launching");
    debug.configurations.set_current(Some(options.clone()));
    let started = debug.sessions.start(options.clone()).await;
    match started {
        Ok(true) => {}
        Ok(false) => {
            debug.shutdown().await;
            anyhow::bail!("'{}' did not start", options.name());
        }
        Err(e) => {
            debug.shutdown().await;
            return Err(e).with_context(|| format!("Failed to launch '{}'", options.name()));
        }
    }

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    loop {
        if debug.sessions.sessions().is_empty() {
            break;
        }
        tokio::select! {
            _ = ended.notified() => {}
            _ = poll.tick() => {}
            Some(root) = launch_changes.recv() => {
                if let Err(e) = debug.configurations.launch_changed(&root).await {
                    warn!(root = %root, "Failed to reload launch file: {}", e);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                eprintln!("Terminating...");
                break;
            }
        }
    }

    debug.shutdown().await;
    Ok(())
}

/// Pick the options to start from the arguments and the persisted selection
async fn select(
    ctx: &CliContext,
    debug: &DebugContext,
    args: &LaunchArgs,
) -> Result<DebugSessionOptions> {
    let folder = match &args.folder {
        Some(folder) => Some(folder_uri(ctx, folder)?),
        None => None,
    };

    let options = match &args.name {
        Some(name) => debug
            .configurations
            .find(name, folder.as_deref())
            .with_context(|| format!("No launch configuration named '{}'", name))?,
        None => debug
            .configurations
            .get_selected_configuration()
            .await?
            .context("No configuration selected; pass a name")?,
    };

    Ok(if args.no_debug {
        with_no_debug(options)
    } else {
        options
    })
}

fn folder_uri(ctx: &CliContext, folder: &str) -> Result<String> {
    let uris = ctx.root_uris();
    uris.iter()
        .find(|uri| folder_name(uri) == folder)
        .cloned()
        .or_else(|| {
            let path = std::path::Path::new(folder);
            path.is_dir().then(|| crate::host::root_uri(path))
        })
        .with_context(|| format!("'{}' is not a workspace folder", folder))
}

fn with_no_debug(options: DebugSessionOptions) -> DebugSessionOptions {
    match options {
        DebugSessionOptions::Configuration(mut options) => {
            options.configuration.no_debug = Some(true);
            DebugSessionOptions::Configuration(options)
        }
        DebugSessionOptions::Compound(mut options) => {
            options.no_debug = Some(true);
            DebugSessionOptions::Compound(options)
        }
    }
}
