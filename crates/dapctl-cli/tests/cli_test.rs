//! Integration tests for the dapctl CLI
//!
//! Builds a workspace on disk and drives the commands through the library:
//! 1. Config loading
//! 2. Launch file discovery across roots
//! 3. Listing and the persisted selection

use anyhow::Result;
use dapctl_cli::commands::list::entries;
use dapctl_cli::context::CliContext;
use dapctl_cli::host::StaticBreakpoints;
use dapctl_config::load_config_from_str;
use std::path::Path;
use tempfile::TempDir;

const LAUNCH_JSON: &str = r#"{
    "version": "0.2.0",
    "configurations": [
        {"type": "python", "request": "launch", "name": "Run", "program": "${workspaceFolder}/main.py"},
        {"type": "node", "request": "launch", "name": "Web"}
    ],
    "compounds": [
        {"name": "Both", "configurations": ["Run", "Web"]}
    ]
}"#;

fn create_config(temp_dir: &TempDir) -> String {
    format!(
        r#"
[configuration]
launch_file = "launch.json"
storage_file = "{}"

[adapters.python]
command = "python3"
args = ["-m", "debugpy.adapter"]
"#,
        temp_dir.path().join("state.json").to_string_lossy()
    )
}

fn write_launch(root: &Path, content: &str) {
    std::fs::write(root.join("launch.json"), content).expect("Failed to write launch.json");
}

fn context(temp_dir: &TempDir, roots: &[&Path]) -> CliContext {
    let config = load_config_from_str(&create_config(temp_dir)).expect("Failed to parse config");
    CliContext::with_config(
        config,
        None,
        roots.iter().map(|root| root.to_path_buf()).collect(),
    )
}

#[tokio::test]
async fn test_list_supported_configurations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path().join("app");
    std::fs::create_dir(&root)?;
    write_launch(&root, LAUNCH_JSON);

    let ctx = context(&temp_dir, &[&root]);
    let listed = entries(&ctx, false).await?;
    let names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();

    // node has no adapter; compounds are always listed
    assert_eq!(names, vec!["Run", "Both"]);
    assert_eq!(listed[0].debug_type.as_deref(), Some("python"));
    assert_eq!(listed[0].folder.as_deref(), Some("app"));
    assert_eq!(listed[1].kind, "compound");
    Ok(())
}

#[tokio::test]
async fn test_list_all_includes_unsupported_types() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path().join("app");
    std::fs::create_dir(&root)?;
    write_launch(&root, LAUNCH_JSON);

    let ctx = context(&temp_dir, &[&root]);
    let listed = entries(&ctx, true).await?;
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().any(|e| e.name == "Web"));
    Ok(())
}

#[tokio::test]
async fn test_roots_without_launch_file_are_empty() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let api = temp_dir.path().join("api");
    let web = temp_dir.path().join("web");
    std::fs::create_dir(&api)?;
    std::fs::create_dir(&web)?;
    write_launch(
        &api,
        r#"{"version":"0.2.0","configurations":[{"type":"python","request":"launch","name":"Api"}]}"#,
    );

    let ctx = context(&temp_dir, &[&api, &web]);
    let debug = ctx.debug_context(StaticBreakpoints::default());
    debug.initialize().await?;

    assert_eq!(debug.configurations.models().len(), 2);
    let found = debug.configurations.find("Api", None).expect("Api not found");
    assert_eq!(found.name(), "Api");
    assert!(debug.configurations.find("Missing", None).is_none());
    Ok(())
}

#[tokio::test]
async fn test_selection_is_persisted_between_contexts() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path().join("app");
    std::fs::create_dir(&root)?;
    write_launch(&root, LAUNCH_JSON);
    let ctx = context(&temp_dir, &[&root]);

    let first = ctx.debug_context(StaticBreakpoints::default());
    first.initialize().await?;
    let both = first.configurations.find("Both", None).expect("Both not found");
    first.configurations.set_current(Some(both));
    first.shutdown().await;

    let second = ctx.debug_context(StaticBreakpoints::default());
    second.initialize().await?;
    let current = second.configurations.current().expect("selection lost");
    assert_eq!(current.name(), "Both");

    let listed = entries(&ctx, false).await?;
    assert!(listed.iter().any(|e| e.name == "Both" && e.current));
    assert!(listed.iter().any(|e| e.name == "Run" && !e.current));
    Ok(())
}
