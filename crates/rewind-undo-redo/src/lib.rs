#![warn(missing_docs)]

//! Threaded, scope-partitioned undo/redo engine
//!
//! Commands carry a forward and a reverse action. The [`Engine`] runs every
//! action on one dedicated worker thread, in submission order, and keeps a
//! cursor-tracked history per [`Stack`]. Stacks are addressed by id or by
//! routing [`Scope`]s; the [`UndoRedoController`] is the facade handed to
//! presentation code.
//!
//! # Example
//!
//! ```
//! use rewind_undo_redo::{Command, EngineConfig, UndoRedoController};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let controller = UndoRedoController::from_config(EngineConfig::new()).unwrap();
//!
//! let command = Command::builder("rename")
//!     .forward(|_| async { Ok(json!("renamed")) })
//!     .reverse(|_| async { Ok(json!("restored")) })
//!     .build()
//!     .unwrap();
//! controller.enqueue(command).unwrap().wait().await.unwrap();
//! assert_eq!(controller.undo_text().as_deref(), Some("rename"));
//!
//! controller.undo().unwrap().wait().await.unwrap();
//! assert_eq!(controller.redo_text().as_deref(), Some("rename"));
//! # });
//! ```

pub mod command;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod progress;
pub mod scope;
pub mod stack;

// Re-export public API
pub use command::{
    ActionFuture, ActionResult, Command, CommandBuilder, CommandKind, CommandStatus,
    UndoableAction,
};
pub use config::EngineConfig;
pub use controller::UndoRedoController;
pub use engine::{Engine, EngineStatus, JobHandle};
pub use error::{Result, UndoRedoError};
pub use events::{EngineEvent, EventBus, Operation, ProgressEvent, DEFAULT_EVENT_CAPACITY};
pub use progress::ProgressReporter;
pub use scope::{has_scope, Scope, Scopes, ALL_SCOPE_NAME, MAX_SCOPES};
pub use stack::{HistoryEntry, Stack, StackId};
