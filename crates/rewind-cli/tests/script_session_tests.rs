//! End-to-end tests for ledger scripts

use rewind_cli::{parse_script, CliError, Ledger, Session};
use rewind_undo_redo::{EngineConfig, UndoRedoController};

fn run_script(config: EngineConfig, script: &str) -> (Ledger, String) {
    let controller = UndoRedoController::from_config(config).unwrap();
    let ledger = Ledger::new();
    let mut session = Session::new(controller, ledger.clone(), Vec::new());
    session.run(&parse_script(script).unwrap()).unwrap();
    let output = String::from_utf8(session.into_output()).unwrap();
    (ledger, output)
}

#[test]
fn test_background_submissions_run_in_order() {
    let script = "\
add car fleet 1 &
add car fleet 2 &
set car fleet 10 &
add car fleet 5 &
wait
balances
";
    let (ledger, output) = run_script(EngineConfig::new().with_scopes(["car"]), script);

    assert_eq!(ledger.balance("car", "fleet"), Some(15));
    assert_eq!(output.matches("queued add car fleet").count(), 3);
    assert!(output.contains("ok set car fleet = 10 -> 10"));
    assert!(output.ends_with("car fleet = 15\n"));
}

#[test]
fn test_undo_limit_forgets_oldest() {
    let script = "\
limit 2
set brand a 1
set brand a 2
set brand a 3
undo
undo
undo
balances
";
    let (ledger, output) = run_script(EngineConfig::new().with_scopes(["brand"]), script);

    assert_eq!(ledger.balance("brand", "a"), Some(1));
    assert_eq!(output.matches("error: No more undos available").count(), 1);
}

#[test]
fn test_routed_stacks_and_scoped_undo() {
    let config = EngineConfig::new()
        .with_scopes(["brand", "car"])
        .with_route("brand", "brands")
        .with_route("car", "cars");
    let script = "\
set brand acme 1
set car fleet 7
set brand acme 2
undo car
history
stack brands
history
undo all
balances
";
    let (ledger, output) = run_script(config, script);

    assert_eq!(ledger.balance("car", "fleet"), None);
    assert_eq!(ledger.balance("brand", "acme"), Some(1));
    assert!(output.contains("history default (0 commands)"));
    assert!(output.contains("stack brands"));
    assert!(output.contains("history brands (2 commands)"));
    assert!(output.contains("> 1: set brand acme = 2"));
}

#[test]
fn test_clear_and_scopes() {
    let script = "\
scopes
set brand a 1
clear
history
undo
";
    let (ledger, output) = run_script(EngineConfig::new().with_scopes(["brand", "car"]), script);

    assert!(output.contains("scopes [brand, car]"));
    assert!(output.contains("cleared"));
    assert!(output.contains("history default (0 commands)"));
    assert!(output.contains("error: No more undos available"));
    // Clearing history never touches application state
    assert_eq!(ledger.balance("brand", "a"), Some(1));
}

#[test]
fn test_unknown_scope_in_undo_is_fatal() {
    let controller =
        UndoRedoController::from_config(EngineConfig::new().with_scopes(["brand"])).unwrap();
    let mut session = Session::new(controller, Ledger::new(), Vec::new());

    let err = session
        .run(&parse_script("undo boat\nset brand a 1\n").unwrap())
        .unwrap_err();
    assert!(matches!(err, CliError::Scope(_)));
}
