//! Engine notifications
//!
//! The engine publishes every state change and every progress report on a
//! tokio broadcast channel. Presentation code subscribes and filters as
//! needed; nothing is lost for a subscriber unless it lags past the channel
//! capacity.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::scope::Scope;

/// Default channel capacity for broadcast events
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Progress notification emitted by a running action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// The action began its work
    Started,
    /// The action finished its work
    Finished,
    /// Bounds of the numeric progress value
    Range {
        /// Lower bound
        minimum: i64,
        /// Upper bound
        maximum: i64,
    },
    /// Current numeric progress
    Value(i64),
    /// Human-readable status
    Text(String),
}

/// Which direction a job ran a command in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// First forward run after submission
    Execute,
    /// Reverse run
    Undo,
    /// Forward run from redo history
    Redo,
}

/// Event broadcast by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Some stack's history or cursor changed
    StateChanged,
    /// An undo is about to run (`active`) or has just ended (`!active`)
    Undoing {
        /// Scope of the command being reversed
        scope: Scope,
        /// Whether the stack is busy
        active: bool,
    },
    /// A redo is about to run (`active`) or has just ended (`!active`)
    Redoing {
        /// Scope of the command being replayed
        scope: Scope,
        /// Whether the stack is busy
        active: bool,
    },
    /// Progress reported by a running action
    Progress {
        /// Command reporting progress
        command_id: Uuid,
        /// The report itself
        event: ProgressEvent,
    },
    /// Terminal result of a job, published exactly once per job that ran
    Completed {
        /// Command the job ran
        command_id: Uuid,
        /// Display text of the command
        text: String,
        /// Direction the command ran in
        operation: Operation,
        /// Error message when the job failed
        error: Option<String>,
    },
}

/// Broadcast bus for engine events
///
/// Clones share the same underlying channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a new event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
