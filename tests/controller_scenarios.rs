//! Workspace-level scenarios driving the controller facade
//!
//! These mirror how presentation code uses the engine: one controller built
//! at startup, cloned into collaborators, observed through events.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rewind_common::{init, LogLevel, LogOptions};
use rewind_undo_redo::{
    has_scope, Command, EngineConfig, EngineEvent, Scope, Scopes, StackId, UndoRedoController,
    UndoRedoError,
};
use serde_json::json;

type Repository = Arc<RwLock<HashMap<String, String>>>;

/// Rename an entity, capturing the old name at execution time
fn rename(repo: &Repository, scope: Scope, id: &str, name: &str) -> Command {
    let forward_repo = Arc::clone(repo);
    let reverse_repo = Arc::clone(repo);
    let previous: Arc<RwLock<Option<Option<String>>>> = Arc::new(RwLock::new(None));
    let forward_previous = Arc::clone(&previous);
    let (id, name) = (id.to_string(), name.to_string());
    let reverse_id = id.clone();

    Command::builder(format!("rename {} to {}", id, name))
        .scope(scope)
        .forward(move |_| {
            let repo = Arc::clone(&forward_repo);
            let previous = Arc::clone(&forward_previous);
            let (id, name) = (id.clone(), name.clone());
            async move {
                let old = repo.write().insert(id, name.clone());
                *previous.write() = Some(old);
                Ok(json!(name))
            }
        })
        .reverse(move |_| {
            let repo = Arc::clone(&reverse_repo);
            let previous = Arc::clone(&previous);
            let id = reverse_id.clone();
            async move {
                let old = previous.write().take().flatten();
                match old {
                    Some(old) => repo.write().insert(id, old),
                    None => repo.write().remove(&id),
                };
                Ok(json!(null))
            }
        })
        .build()
        .unwrap()
}

fn controller() -> UndoRedoController {
    // Tests share one process; only the first init succeeds
    let _ = init(LogOptions {
        level: Some(LogLevel::Warn),
        debug: false,
        respect_env: true,
    });
    UndoRedoController::from_config(EngineConfig::new().with_scopes(["brand", "car"])).unwrap()
}

#[test]
fn test_scope_registry_scenario() {
    let scopes = Scopes::from_string("brand,car").unwrap();

    assert_eq!(scopes.flags_for("brand"), Some(1));
    assert_eq!(scopes.flags_for("car"), Some(2));
    assert_eq!(scopes.scope_from_string("brand,car").unwrap(), Scope::Set(3));
    assert_eq!(scopes.scope_from_string("car, all").unwrap(), Scope::All);

    assert!(has_scope(Scope::All, Scope::Set(2)));
    assert!(has_scope(Scope::Set(0b111), Scope::Set(0b010)));
    assert!(!has_scope(Scope::Set(0b001), Scope::Set(0b110)));
}

#[tokio::test]
async fn test_two_scopes_queue_and_undo() {
    let controller = controller();
    let scopes = controller.scopes();
    let repo: Repository = Arc::default();

    controller
        .enqueue(rename(&repo, scopes.scope("brand").unwrap(), "b1", "Acme"))
        .unwrap();
    let last = controller
        .enqueue(rename(&repo, scopes.scope("car").unwrap(), "c1", "Roadster"))
        .unwrap();
    last.wait().await.unwrap();

    assert_eq!(controller.number_of_commands(), 2);
    assert_eq!(controller.undo_text().as_deref(), Some("rename c1 to Roadster"));

    controller.undo().unwrap().wait().await.unwrap();
    assert_eq!(controller.redo_text().as_deref(), Some("rename c1 to Roadster"));
    assert_eq!(controller.undo_text().as_deref(), Some("rename b1 to Acme"));
    assert!(!repo.read().contains_key("c1"));
    assert_eq!(repo.read().get("b1").map(String::as_str), Some("Acme"));
}

#[tokio::test]
async fn test_undo_redo_round_trip_restores_repository() {
    let controller = controller();
    let brand = controller.scopes().scope("brand").unwrap();
    let repo: Repository = Arc::default();

    for name in ["Acme", "Acme Corp", "ACME"] {
        controller.enqueue(rename(&repo, brand, "b1", name)).unwrap();
    }
    controller.set_current_index(Some(2)).unwrap().wait().await.unwrap();
    let before = repo.read().clone();

    controller.undo().unwrap().wait().await.unwrap();
    assert_eq!(repo.read().get("b1").map(String::as_str), Some("Acme Corp"));
    controller.redo().unwrap().wait().await.unwrap();

    assert_eq!(*repo.read(), before);
}

#[tokio::test]
async fn test_presentation_layer_sees_busy_state() {
    let controller = controller();
    let car = controller.scopes().scope("car").unwrap();
    let repo: Repository = Arc::default();
    controller
        .enqueue(rename(&repo, car, "c1", "Coupe"))
        .unwrap()
        .wait()
        .await
        .unwrap();

    let mut events = controller.subscribe();
    controller.redo().unwrap().wait().await.unwrap_err();
    controller.undo().unwrap().wait().await.unwrap();

    let mut busy = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Undoing { scope, active } = event {
            busy.push((scope, active));
        }
    }
    assert_eq!(busy, vec![(car, true), (car, false)]);
}

#[tokio::test]
async fn test_independent_stacks_keep_separate_histories() {
    let controller = controller();
    let brand = controller.scopes().scope("brand").unwrap();
    let repo: Repository = Arc::default();

    controller.enqueue(rename(&repo, brand, "b1", "Acme")).unwrap();
    controller.set_active_stack(Some(StackId::new("drafts")));
    controller
        .enqueue(rename(&repo, brand, "b2", "Draft"))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(controller.undo_redo_text_list(), vec!["rename b2 to Draft"]);
    controller.set_active_stack(None);
    assert_eq!(controller.undo_redo_text_list(), vec!["rename b1 to Acme"]);
    assert_eq!(controller.active_stack_id(), StackId::default());
}

#[tokio::test]
async fn test_jump_beyond_history_is_rejected() {
    let controller = controller();
    let result = controller.set_current_index(Some(0)).unwrap().wait().await;
    assert!(matches!(
        result,
        Err(UndoRedoError::IndexOutOfRange { index: 0, count: 0 })
    ));
    assert!(!controller.is_running());
}

#[test]
fn test_engine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rewind.json");
    EngineConfig::new()
        .with_scopes(["brand", "car"])
        .with_undo_limit(10)
        .with_route("car", "garage")
        .save_to_file(&path)
        .unwrap();

    let config = EngineConfig::load_from_file(&path).unwrap();
    let controller = UndoRedoController::from_config(config).unwrap();
    let car = controller.scopes().scope("car").unwrap();
    let repo: Repository = Arc::default();

    controller
        .enqueue(rename(&repo, car, "c1", "Van"))
        .unwrap()
        .wait_blocking()
        .unwrap();

    assert_eq!(controller.number_of_commands(), 0);
    controller.set_active_stack(Some(StackId::new("garage")));
    assert_eq!(controller.number_of_commands(), 1);
}
