//! Tests for DebugConfigurationManager

use super::manager::{DebugConfigurationManager, STORAGE_KEY};
use dapctl_config::ConfigurationConfig;
use dapctl_core::{DebugConfigurationSessionOptions, DebugSessionOptions, Error};
use dapctl_testing::fixtures::{self, ROOT_A, ROOT_B};
use dapctl_testing::MockPorts;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn manager(ports: &MockPorts) -> Arc<DebugConfigurationManager> {
    DebugConfigurationManager::new(
        ports.workspace.clone(),
        ports.launch.clone(),
        ports.debug.clone(),
        ports.editor.clone(),
        ports.storage.clone(),
        ConfigurationConfig::default(),
    )
}

/// Two roots: A has "Launch" and "Shared" plus compound "Both",
/// B has "Attach" and "Shared"
async fn two_root_manager() -> (MockPorts, Arc<DebugConfigurationManager>) {
    let ports = MockPorts::with_roots(&[ROOT_A, ROOT_B]);
    ports.launch.set(
        ROOT_A,
        fixtures::launch_file(
            &[fixtures::launch_config("Launch"), fixtures::launch_config("Shared")],
            &[fixtures::compound("Both", &["Launch", "Shared"])],
        ),
    );
    ports.launch.set(
        ROOT_B,
        fixtures::launch_file(
            &[fixtures::attach_config("Attach"), fixtures::launch_config("Shared")],
            &[],
        ),
    );
    let manager = manager(&ports);
    manager.update_models().await.unwrap();
    (ports, manager)
}

// ============================================================================
// Models
// ============================================================================

#[tokio::test]
async fn test_update_models_follows_workspace_roots() {
    let (ports, manager) = two_root_manager().await;
    assert_eq!(manager.models().len(), 2);

    ports.workspace.set_roots(&[ROOT_B]);
    manager.update_models().await.unwrap();

    let models = manager.models();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].workspace_folder_uri(), ROOT_B);
    assert!(manager.model(ROOT_A).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_workspace_changed_is_debounced() {
    let (ports, manager) = two_root_manager().await;
    ports.workspace.set_roots(&[ROOT_A]);

    manager.workspace_changed();
    manager.workspace_changed();
    assert_eq!(manager.models().len(), 2);

    tokio::time::sleep(ConfigurationConfig::default().debounce() + Duration::from_millis(10)).await;
    assert_eq!(manager.models().len(), 1);
}

#[tokio::test]
async fn test_launch_changed_reconciles_one_root() {
    let (ports, manager) = two_root_manager().await;
    ports.launch.set(
        ROOT_B,
        fixtures::launch_file(&[fixtures::launch_config("Fresh")], &[]),
    );

    manager.launch_changed(ROOT_B).await.unwrap();

    assert!(manager.find("Fresh", Some(ROOT_B)).is_some());
    assert!(manager.find("Attach", None).is_none());
}

// ============================================================================
// Lookup
// ============================================================================

#[tokio::test]
async fn test_all_lists_configurations_then_compounds_per_root() {
    let (_ports, manager) = two_root_manager().await;
    let names: Vec<_> = manager
        .all()
        .iter()
        .map(|o| o.name().to_string())
        .collect();
    assert_eq!(names, vec!["Launch", "Shared", "Both", "Attach", "Shared"]);
}

#[tokio::test]
async fn test_find_searches_roots_in_order() {
    let (_ports, manager) = two_root_manager().await;

    let any = manager.find("Shared", None).unwrap();
    assert_eq!(any.workspace_folder_uri(), Some(ROOT_A));

    let in_b = manager.find("Shared", Some(ROOT_B)).unwrap();
    assert_eq!(in_b.workspace_folder_uri(), Some(ROOT_B));

    assert!(manager.find("Launch", Some(ROOT_B)).is_none());
    assert!(manager.find("Missing", None).is_none());
}

#[tokio::test]
async fn test_find_prefers_configuration_over_compound() {
    let ports = MockPorts::with_roots(&[ROOT_A]);
    ports.launch.set(
        ROOT_A,
        fixtures::launch_file(
            &[fixtures::launch_config("Same")],
            &[fixtures::compound("Same", &["Other"])],
        ),
    );
    let manager = manager(&ports);
    manager.update_models().await.unwrap();

    let found = manager.find("Same", None).unwrap();
    assert!(!found.is_compound());
}

#[tokio::test]
async fn test_supported_filters_unknown_debug_types() {
    let ports = MockPorts::with_roots(&[ROOT_A]);
    let mut unknown = fixtures::launch_config("Node");
    unknown.debug_type = "node".to_string();
    ports.launch.set(
        ROOT_A,
        fixtures::launch_file(
            &[fixtures::launch_config("Launch"), unknown],
            &[fixtures::compound("All", &["Launch", "Node"])],
        ),
    );
    let manager = manager(&ports);
    manager.update_models().await.unwrap();

    let names: Vec<_> = manager
        .supported()
        .await
        .unwrap()
        .iter()
        .map(|o| o.name().to_string())
        .collect();
    assert_eq!(names, vec!["Launch", "All"]);
}

// ============================================================================
// Compound members
// ============================================================================

#[tokio::test]
async fn test_compound_member_in_compound_root() {
    let (_ports, manager) = two_root_manager().await;
    let both = manager.find("Both", None).unwrap();
    let compound = both.compound().unwrap().clone();

    let member = manager
        .resolve_compound_member(&compound, &"Shared".into(), Some(ROOT_A))
        .unwrap();
    assert_eq!(member.workspace_folder_uri.as_deref(), Some(ROOT_A));
}

#[tokio::test]
async fn test_unqualified_member_without_root_is_ambiguous() {
    let (_ports, manager) = two_root_manager().await;
    let compound = fixtures::compound("Global", &["Shared"]);

    let err = manager
        .resolve_compound_member(&compound, &"Shared".into(), None)
        .unwrap_err();
    assert_eq!(err, Error::AmbiguousConfiguration("Shared".into()));

    let attach = manager
        .resolve_compound_member(&compound, &"Attach".into(), None)
        .unwrap();
    assert_eq!(attach.workspace_folder_uri.as_deref(), Some(ROOT_B));
}

#[tokio::test]
async fn test_qualified_member_matches_folder_name() {
    let (_ports, manager) = two_root_manager().await;
    let compound = fixtures::compound("Global", &[]);

    let by_name = manager
        .resolve_compound_member(&compound, &fixtures::qualified("Shared", "b"), Some(ROOT_A))
        .unwrap();
    assert_eq!(by_name.workspace_folder_uri.as_deref(), Some(ROOT_B));

    let by_uri = manager
        .resolve_compound_member(&compound, &fixtures::qualified("Shared", ROOT_A), None)
        .unwrap();
    assert_eq!(by_uri.workspace_folder_uri.as_deref(), Some(ROOT_A));

    let err = manager
        .resolve_compound_member(&compound, &fixtures::qualified("Shared", "c"), None)
        .unwrap_err();
    assert_eq!(err, Error::ConfigurationNotFound("Shared".into()));
}

#[tokio::test]
async fn test_compound_member_cycle() {
    let (_ports, manager) = two_root_manager().await;
    let compound = fixtures::compound("Loop", &["Loop"]);

    let err = manager
        .resolve_compound_member(&compound, &"Loop".into(), Some(ROOT_A))
        .unwrap_err();
    assert_eq!(err, Error::CompoundCycle("Loop".into()));
}

// ============================================================================
// Current selection
// ============================================================================

#[tokio::test]
async fn test_current_defaults_to_first_configuration_of_current_root() {
    let (ports, manager) = two_root_manager().await;
    assert_eq!(manager.current().unwrap().name(), "Launch");

    ports.workspace.set_current_root(Some(ROOT_B));
    manager.set_current(None);
    let current = manager.current().unwrap();
    assert_eq!(current.name(), "Attach");
    assert_eq!(current.workspace_folder_uri(), Some(ROOT_B));
}

#[tokio::test]
async fn test_current_falls_back_when_configuration_removed() {
    let (ports, manager) = two_root_manager().await;
    manager.set_current(manager.find("Shared", Some(ROOT_A)));
    assert_eq!(manager.current().unwrap().name(), "Shared");

    ports.launch.set(
        ROOT_A,
        fixtures::launch_file(&[fixtures::launch_config("Launch")], &[]),
    );
    manager.launch_changed(ROOT_A).await.unwrap();

    assert_eq!(manager.current().unwrap().name(), "Launch");
}

#[tokio::test]
async fn test_set_current_fires_change() {
    let (_ports, manager) = two_root_manager().await;
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let _sub = manager.on_did_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    manager.set_current(manager.find("Both", None));

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(manager.current().unwrap().is_compound());
}

#[tokio::test]
async fn test_dynamic_selection_is_kept_and_recorded() {
    let (ports, manager) = two_root_manager().await;
    let dynamic = fixtures::launch_config("Generated");
    ports.debug.add_dynamic("mock", dynamic.clone());

    let options = manager.find_configuration(dynamic, Some(ROOT_A), Some("mock"));
    manager.set_current(Some(options.clone().into()));

    assert_eq!(manager.current(), Some(DebugSessionOptions::from(options)));
    assert_eq!(manager.recent_dynamic_options().len(), 1);

    let selected = manager.get_selected_configuration().await.unwrap().unwrap();
    assert!(selected.is_dynamic());
}

#[tokio::test]
async fn test_selected_dynamic_configuration_missing() {
    let (ports, manager) = two_root_manager().await;
    let options =
        manager.find_configuration(fixtures::launch_config("Gone"), Some(ROOT_A), Some("mock"));
    manager.set_current(Some(options.into()));
    ports.debug.clear_dynamic();

    let err = manager.get_selected_configuration().await.unwrap_err();
    assert_eq!(
        err,
        Error::DynamicConfigurationMissing {
            provider_type: "mock".into(),
            name: "Gone".into()
        }
    );
}

#[tokio::test]
async fn test_dynamic_configurations_are_tagged() {
    let (ports, manager) = two_root_manager().await;
    ports.debug.add_dynamic("mock", fixtures::launch_config("Generated"));

    let dynamic = manager.dynamic_configurations().await.unwrap();
    assert_eq!(dynamic.len(), 1);
    assert_eq!(dynamic[0].provider_type.as_deref(), Some("mock"));
    assert_eq!(dynamic[0].workspace_folder_uri.as_deref(), Some(ROOT_A));
}

// ============================================================================
// Launch file
// ============================================================================

#[tokio::test]
async fn test_open_configuration_creates_missing_file() {
    let ports = MockPorts::with_roots(&[ROOT_A]);
    let manager = manager(&ports);
    manager.update_models().await.unwrap();
    assert!(manager.model(ROOT_A).unwrap().uri().is_none());

    manager.open_configuration().await.unwrap();

    assert_eq!(ports.launch.created(), vec![ROOT_A.to_string()]);
    let opened = ports.editor.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].uri, "file:///work/a/.dapctl/launch.json");
    assert_eq!(
        ports.launch.get(ROOT_A).unwrap()["configurations"],
        json!([])
    );
}

#[tokio::test]
async fn test_open_configuration_keeps_existing_file() {
    let (ports, manager) = two_root_manager().await;

    manager.open_configuration().await.unwrap();

    assert!(ports.launch.created().is_empty());
    assert_eq!(ports.editor.opened().len(), 1);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_save_and_load_selection() {
    let (ports, manager) = two_root_manager().await;
    manager.set_current(manager.find("Shared", Some(ROOT_B)));
    let dynamic = DebugConfigurationSessionOptions::dynamic(
        fixtures::launch_config("Generated"),
        Some(ROOT_A.to_string()),
        "mock",
    );
    manager.set_current(Some(dynamic.into()));
    manager.set_current(manager.find("Shared", Some(ROOT_B)));
    manager.save().await.unwrap();

    let restored = self::manager(&ports);
    restored.update_models().await.unwrap();
    restored.load().await.unwrap();

    let current = restored.current().unwrap();
    assert_eq!(current.name(), "Shared");
    assert_eq!(current.workspace_folder_uri(), Some(ROOT_B));
    assert_eq!(restored.recent_dynamic_options().len(), 1);
}

#[tokio::test]
async fn test_load_backfills_missing_names() {
    let (ports, manager) = two_root_manager().await;
    ports.storage.set(
        STORAGE_KEY,
        json!({
            "current": {
                "compound": {"name": "Both", "configurations": ["Launch", "Shared"]},
                "workspaceFolderUri": ROOT_A
            },
            "recentDynamicOptions": [{
                "configuration": {"type": "mock", "name": "Generated", "request": "launch"},
                "providerType": "mock"
            }]
        }),
    );

    manager.load().await.unwrap();

    let current = manager.current().unwrap();
    assert!(current.is_compound());
    assert_eq!(current.name(), "Both");
    let recent = manager.recent_dynamic_options();
    assert_eq!(recent[0].name, "Generated");
}

#[tokio::test]
async fn test_load_without_stored_data() {
    let (_ports, manager) = two_root_manager().await;
    manager.load().await.unwrap();
    assert_eq!(manager.current().unwrap().name(), "Launch");
}
