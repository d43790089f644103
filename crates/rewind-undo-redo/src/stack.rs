//! Per-domain command history with a cursor

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::Command;
use crate::scope::Scope;

/// Identity of an undo stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(String);

impl StackId {
    /// Name of the well-known default stack
    pub const DEFAULT: &'static str = "default";

    /// Create a stack id
    pub fn new(id: impl Into<String>) -> Self {
        StackId(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StackId {
    fn default() -> Self {
        StackId::new(Self::DEFAULT)
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StackId {
    fn from(id: &str) -> Self {
        StackId::new(id)
    }
}

impl From<String> for StackId {
    fn from(id: String) -> Self {
        StackId(id)
    }
}

/// Snapshot of one history slot, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the history
    pub index: usize,
    /// Command id
    pub command_id: Uuid,
    /// Display text
    pub text: String,
    /// Scope tag
    pub scope: Scope,
    /// Whether this command sits after the cursor
    pub is_undone: bool,
}

/// Ordered history of commands for one undo domain
///
/// Commands at positions `0..=current_index` are applied; the rest are
/// available for redo.
#[derive(Debug, Clone)]
pub struct Stack {
    id: StackId,
    commands: Vec<Command>,
    applied: usize,
    last_touched: u64,
}

impl Stack {
    /// Create an empty stack
    pub fn new(id: impl Into<StackId>) -> Self {
        Stack {
            id: id.into(),
            commands: Vec::new(),
            applied: 0,
            last_touched: 0,
        }
    }

    /// Stack identity
    pub fn id(&self) -> &StackId {
        &self.id
    }

    /// Append a command after the cursor
    ///
    /// Everything available for redo is discarded first.
    pub fn push(&mut self, command: Command) {
        if self.applied < self.commands.len() {
            let dropped = self.commands.len() - self.applied;
            tracing::debug!(stack = %self.id, dropped, "Discarding redo history");
            self.commands.truncate(self.applied);
        }
        self.commands.push(command);
        self.applied = self.commands.len();
    }

    /// Advance the cursor; false at the end of history
    pub fn step_forward(&mut self) -> bool {
        if !self.can_step_forward() {
            return false;
        }
        self.applied += 1;
        true
    }

    /// Move the cursor back; false at the start of history
    pub fn step_backward(&mut self) -> bool {
        if !self.can_step_backward() {
            return false;
        }
        self.applied -= 1;
        true
    }

    /// Drop the oldest commands beyond `limit` (0 means unlimited)
    ///
    /// Returns how many commands were dropped. The cursor keeps pointing at
    /// the same command when it survives. When the cut would reach past the
    /// cursor, the redo entries go first: a redoable command must never
    /// outlive an undone command before it.
    pub fn truncate_to_limit(&mut self, limit: usize) -> usize {
        if limit == 0 || self.commands.len() <= limit {
            return 0;
        }
        let mut dropped = 0;
        if self.commands.len() - limit > self.applied {
            dropped += self.commands.len() - self.applied;
            self.commands.truncate(self.applied);
        }
        if self.commands.len() > limit {
            let excess = self.commands.len() - limit;
            self.commands.drain(..excess);
            self.applied -= excess;
            dropped += excess;
        }
        dropped
    }

    /// Forget every command
    pub fn clear(&mut self) {
        self.commands.clear();
        self.applied = 0;
    }

    /// Display text at `index`
    pub fn text_at(&self, index: usize) -> Option<&str> {
        self.commands.get(index).map(Command::text)
    }

    /// Command at `index`
    pub fn command_at(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    /// Number of commands in history
    pub fn count(&self) -> usize {
        self.commands.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Index of the last applied command, `None` when nothing is applied
    pub fn current_index(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    /// Whether a redo is possible
    pub fn can_step_forward(&self) -> bool {
        self.applied < self.commands.len()
    }

    /// Whether an undo is possible
    pub fn can_step_backward(&self) -> bool {
        self.applied > 0
    }

    /// Command an undo would reverse
    pub fn undo_command(&self) -> Option<&Command> {
        self.current_index().and_then(|index| self.commands.get(index))
    }

    /// Command a redo would replay
    pub fn redo_command(&self) -> Option<&Command> {
        self.commands.get(self.applied)
    }

    /// Text of the command an undo would reverse
    pub fn undo_text(&self) -> Option<&str> {
        self.undo_command().map(Command::text)
    }

    /// Text of the command a redo would replay
    pub fn redo_text(&self) -> Option<&str> {
        self.redo_command().map(Command::text)
    }

    /// Display text of every command, oldest first
    pub fn texts(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.text().to_string()).collect()
    }

    /// History entries, oldest first
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.commands
            .iter()
            .enumerate()
            .map(|(index, command)| HistoryEntry {
                index,
                command_id: command.id(),
                text: command.text().to_string(),
                scope: command.scope(),
                is_undone: index >= self.applied,
            })
            .collect()
    }

    pub(crate) fn last_touched(&self) -> u64 {
        self.last_touched
    }

    pub(crate) fn touch(&mut self, sequence: u64) {
        self.last_touched = sequence;
    }
}
