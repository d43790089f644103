//! Presentation-facing facade over one shared [`Engine`]
//!
//! The controller holds no state of its own. Construct the engine once at
//! startup, wrap it, and clone the controller into every collaborator that
//! needs undo/redo.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::command::Command;
use crate::config::EngineConfig;
use crate::engine::{Engine, JobHandle};
use crate::error::Result;
use crate::events::EngineEvent;
use crate::scope::Scopes;
use crate::stack::{HistoryEntry, StackId};

/// Cheaply cloneable handle to the process-wide engine
#[derive(Clone, Debug)]
pub struct UndoRedoController {
    engine: Arc<Engine>,
}

impl UndoRedoController {
    /// Wrap an existing engine
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Build the engine from `config` and wrap it
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(Engine::new(config)?)))
    }

    /// Underlying engine
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Whether the active stack has something to undo
    pub fn can_undo(&self) -> bool {
        self.engine.can_undo()
    }

    /// Whether the active stack has something to redo
    pub fn can_redo(&self) -> bool {
        self.engine.can_redo()
    }

    /// Text of the command the next undo reverses
    pub fn undo_text(&self) -> Option<String> {
        self.engine.undo_text()
    }

    /// Text of the command the next redo replays
    pub fn redo_text(&self) -> Option<String> {
        self.engine.redo_text()
    }

    /// Every command of the active stack, oldest first
    ///
    /// Pair with [`UndoRedoController::current_index`] to tell applied
    /// entries from redoable ones.
    pub fn undo_redo_text_list(&self) -> Vec<String> {
        self.engine.text_list()
    }

    /// History entries of the active stack
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.engine.history()
    }

    /// Index of the last applied command, if any
    pub fn current_index(&self) -> Option<usize> {
        self.engine.current_index()
    }

    /// Identity of the active stack
    pub fn active_stack_id(&self) -> StackId {
        self.engine.active_stack_id()
    }

    /// Commands held by the active stack
    pub fn number_of_commands(&self) -> usize {
        self.engine.count()
    }

    /// Whether any job is queued or running
    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Waiting commands on the active stack whose scope matches `filter`
    ///
    /// `filter` is a comma/space separated list of scope names.
    pub fn queued_command_text_list_by_scope(&self, filter: &str) -> Result<Vec<String>> {
        let filter = self.engine.scopes().scope_from_string(filter)?;
        Ok(self.engine.queued_command_text_list_by_scope(filter))
    }

    /// Queue a command; see [`Engine::enqueue`]
    pub fn enqueue(&self, command: Command) -> Result<JobHandle> {
        self.engine.enqueue(command)
    }

    /// Undo on the active stack
    pub fn undo(&self) -> Result<JobHandle> {
        self.engine.undo(None)
    }

    /// Redo on the active stack
    pub fn redo(&self) -> Result<JobHandle> {
        self.engine.redo(None)
    }

    /// Undo the most recent command matching the named scopes
    pub fn undo_in_scope(&self, scope: &str) -> Result<JobHandle> {
        let filter = self.engine.scopes().scope_from_string(scope)?;
        self.engine.undo(Some(filter))
    }

    /// Redo the next command matching the named scopes
    pub fn redo_in_scope(&self, scope: &str) -> Result<JobHandle> {
        let filter = self.engine.scopes().scope_from_string(scope)?;
        self.engine.redo(Some(filter))
    }

    /// Drop all history and discard waiting jobs
    pub fn clear(&self) {
        self.engine.clear()
    }

    /// Jump the active stack's cursor, reversing or replaying as needed
    pub fn set_current_index(&self, index: Option<usize>) -> Result<JobHandle> {
        self.engine.set_current_index(index)
    }

    /// Select the active stack; `None` selects the default stack
    pub fn set_active_stack(&self, stack: Option<StackId>) {
        self.engine.set_active_stack(stack)
    }

    /// Set the per-stack history limit (0 = unlimited)
    pub fn set_undo_limit(&self, limit: usize) {
        self.engine.set_undo_limit(limit)
    }

    /// Copy of the scope registry
    pub fn scopes(&self) -> Scopes {
        self.engine.scopes()
    }

    /// Receive every future engine event
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UndoRedoError;
    use parking_lot::Mutex;
    use serde_json::json;

    fn controller() -> UndoRedoController {
        UndoRedoController::from_config(EngineConfig::new().with_scopes(["brand", "car"])).unwrap()
    }

    fn append(log: &Arc<Mutex<Vec<String>>>, text: &str, scope: &str, scopes: &Scopes) -> Command {
        let forward_log = Arc::clone(log);
        let reverse_log = Arc::clone(log);
        let entry = text.to_string();
        Command::builder(text)
            .scope(scopes.scope_from_string(scope).unwrap())
            .forward(move |_| {
                let log = Arc::clone(&forward_log);
                let entry = entry.clone();
                async move {
                    log.lock().push(entry);
                    Ok(json!(null))
                }
            })
            .reverse(move |_| {
                let log = Arc::clone(&reverse_log);
                async move {
                    log.lock().pop();
                    Ok(json!(null))
                }
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_clones_share_one_engine() {
        let first = controller();
        let second = first.clone();
        let log = Arc::new(Mutex::new(Vec::new()));

        first
            .enqueue(append(&log, "one", "brand", &first.scopes()))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(second.number_of_commands(), 1);
        assert!(Arc::ptr_eq(first.engine(), second.engine()));
    }

    #[tokio::test]
    async fn test_undo_redo_texts() {
        let controller = controller();
        let scopes = controller.scopes();
        let log = Arc::new(Mutex::new(Vec::new()));

        controller.enqueue(append(&log, "C1", "brand", &scopes)).unwrap();
        controller
            .enqueue(append(&log, "C2", "car", &scopes))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(controller.undo_text().as_deref(), Some("C2"));
        controller.undo().unwrap().wait().await.unwrap();

        assert_eq!(controller.redo_text().as_deref(), Some("C2"));
        assert_eq!(controller.undo_text().as_deref(), Some("C1"));
        assert_eq!(controller.undo_redo_text_list(), vec!["C1", "C2"]);
        assert_eq!(controller.current_index(), Some(0));
        assert_eq!(*log.lock(), vec!["C1"]);

        controller.redo().unwrap().wait().await.unwrap();
        assert_eq!(*log.lock(), vec!["C1", "C2"]);
        assert!(!controller.can_redo());
    }

    #[tokio::test]
    async fn test_unknown_scope_names_rejected() {
        let controller = controller();

        let err = controller.undo_in_scope("boat").unwrap_err();
        assert!(matches!(err, UndoRedoError::UnknownScope(_)));
        assert!(controller.queued_command_text_list_by_scope("boat").is_err());
        assert!(controller
            .queued_command_text_list_by_scope("all")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_undo_in_scope_skips_other_scopes() {
        let controller = controller();
        let scopes = controller.scopes();
        let log = Arc::new(Mutex::new(Vec::new()));

        controller.enqueue(append(&log, "C1", "brand", &scopes)).unwrap();
        controller
            .enqueue(append(&log, "C2", "car", &scopes))
            .unwrap()
            .wait()
            .await
            .unwrap();

        // Top of the active stack is a car command, so a brand undo finds nothing
        let result = controller.undo_in_scope("brand").unwrap().wait().await;
        assert!(matches!(result, Err(UndoRedoError::NoMoreUndos)));

        controller.undo_in_scope("car").unwrap().wait().await.unwrap();
        assert_eq!(controller.undo_text().as_deref(), Some("C1"));
    }
}
