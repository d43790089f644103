//! Commands: reversible units of work
//!
//! A [`Command`] pairs display metadata (text, kind, scope) with an
//! [`UndoableAction`]. Concrete operations either implement the trait
//! directly or hand async closures to [`CommandBuilder`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, UndoRedoError};
use crate::progress::ProgressReporter;
use crate::scope::Scope;
use crate::stack::StackId;

/// Outcome of running an action
pub type ActionResult = Result<serde_json::Value>;

/// Boxed future returned by closure-backed actions
pub type ActionFuture = BoxFuture<'static, ActionResult>;

type ActionFn = Arc<dyn Fn(ProgressReporter) -> ActionFuture + Send + Sync>;

/// Forward and reverse behavior of one concrete operation
///
/// Implementations must capture everything `reverse` needs (typically a
/// snapshot of the state `execute` overwrote) so that the pair can run any
/// number of times once the first `execute` succeeded.
#[async_trait]
pub trait UndoableAction: Send + Sync {
    /// Apply the operation
    async fn execute(&self, progress: &ProgressReporter) -> ActionResult;

    /// Revert the operation
    async fn reverse(&self, progress: &ProgressReporter) -> ActionResult;
}

/// Distinguishes state-changing commands from read-only ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Changes application state; recorded in history
    Mutating,
    /// Reads application state; never recorded, reverse is a no-op
    Query,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Mutating => write!(f, "Mutating"),
            CommandKind::Query => write!(f, "Query"),
        }
    }
}

/// Where a command is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Built or queued, never run
    Pending,
    /// An action is executing right now
    Running,
    /// Forward action succeeded last
    Applied,
    /// Reverse action succeeded last
    Reversed,
    /// The first forward run failed
    Failed,
}

struct ClosureAction {
    forward: ActionFn,
    reverse: Option<ActionFn>,
}

#[async_trait]
impl UndoableAction for ClosureAction {
    async fn execute(&self, progress: &ProgressReporter) -> ActionResult {
        (self.forward)(progress.clone()).await
    }

    async fn reverse(&self, progress: &ProgressReporter) -> ActionResult {
        match &self.reverse {
            Some(reverse) => reverse(progress.clone()).await,
            None => Ok(serde_json::Value::Null),
        }
    }
}

/// A reversible (or, for queries, trivially reversible) unit of work
///
/// Clones share the action and the status.
#[derive(Clone)]
pub struct Command {
    id: Uuid,
    text: String,
    kind: CommandKind,
    scope: Scope,
    stack: Option<StackId>,
    created_at: DateTime<Utc>,
    action: Arc<dyn UndoableAction>,
    status: Arc<Mutex<CommandStatus>>,
}

impl Command {
    /// Start building a mutating command
    pub fn builder(text: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(text, CommandKind::Mutating)
    }

    /// Start building a query command
    pub fn query(text: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(text, CommandKind::Query)
    }

    /// Unique identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Display text for undo/redo menus
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Mutating or query
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Scope tag
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Explicit target stack, if any
    pub fn stack(&self) -> Option<&StackId> {
        self.stack.as_ref()
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle status
    pub fn status(&self) -> CommandStatus {
        *self.status.lock()
    }

    /// Whether this is a query command
    pub fn is_query(&self) -> bool {
        self.kind == CommandKind::Query
    }

    /// Run the forward action
    ///
    /// Panics inside the action are caught and reported as
    /// [`UndoRedoError::UnknownFailure`]; the reporter is closed once the
    /// action returns.
    pub async fn execute(&self, progress: &ProgressReporter) -> ActionResult {
        let previous = self.begin();
        let outcome = AssertUnwindSafe(self.action.execute(progress))
            .catch_unwind()
            .await;
        progress.close();

        let result = self.settle(outcome);
        self.finish(previous, result.is_ok(), CommandStatus::Applied);
        result
    }

    /// Run the reverse action
    ///
    /// Always succeeds without running anything for query commands.
    pub async fn reverse(&self, progress: &ProgressReporter) -> ActionResult {
        if self.is_query() {
            progress.close();
            return Ok(serde_json::Value::Null);
        }

        let previous = self.begin();
        let outcome = AssertUnwindSafe(self.action.reverse(progress))
            .catch_unwind()
            .await;
        progress.close();

        let result = self.settle(outcome);
        self.finish(previous, result.is_ok(), CommandStatus::Reversed);
        result
    }

    fn begin(&self) -> CommandStatus {
        let mut status = self.status.lock();
        let previous = *status;
        *status = CommandStatus::Running;
        previous
    }

    fn finish(&self, previous: CommandStatus, succeeded: bool, on_success: CommandStatus) {
        let mut status = self.status.lock();
        *status = match (succeeded, previous) {
            (true, _) => on_success,
            (false, CommandStatus::Pending) | (false, CommandStatus::Failed) => {
                CommandStatus::Failed
            }
            (false, previous) => previous,
        };
    }

    fn settle(
        &self,
        outcome: std::result::Result<ActionResult, Box<dyn Any + Send>>,
    ) -> ActionResult {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) if error.is_command_failure() => Err(error),
            Ok(Err(error)) => Err(UndoRedoError::execution_failed(
                self.text.clone(),
                error.to_string(),
            )),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    command_id = %self.id,
                    command = %self.text,
                    panic = %message,
                    "Command action panicked"
                );
                Err(UndoRedoError::UnknownFailure {
                    command: self.text.clone(),
                    message,
                })
            }
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("stack", &self.stack)
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} ({})",
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.kind,
            self.text,
            self.scope
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown error".to_string()
    }
}

/// Builder for [`Command`]
pub struct CommandBuilder {
    text: String,
    kind: CommandKind,
    scope: Scope,
    stack: Option<StackId>,
    action: Option<Arc<dyn UndoableAction>>,
    forward: Option<ActionFn>,
    reverse: Option<ActionFn>,
}

impl CommandBuilder {
    fn new(text: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            text: text.into(),
            kind,
            scope: Scope::All,
            stack: None,
            action: None,
            forward: None,
            reverse: None,
        }
    }

    /// Tag the command with a scope (defaults to the wildcard)
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Target an explicit stack instead of routing by scope
    pub fn stack(mut self, stack: impl Into<StackId>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Use a trait-implementing action
    pub fn action(mut self, action: impl UndoableAction + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    /// Use a shared trait-implementing action
    pub fn shared_action(mut self, action: Arc<dyn UndoableAction>) -> Self {
        self.action = Some(action);
        self
    }

    /// Forward action as an async closure
    pub fn forward<F, Fut>(mut self, forward: F) -> Self
    where
        F: Fn(ProgressReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.forward = Some(Arc::new(move |progress| forward(progress).boxed()));
        self
    }

    /// Reverse action as an async closure
    pub fn reverse<F, Fut>(mut self, reverse: F) -> Self
    where
        F: Fn(ProgressReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.reverse = Some(Arc::new(move |progress| reverse(progress).boxed()));
        self
    }

    /// Finish the command
    ///
    /// Fails when no forward behavior was supplied, or when both a trait
    /// action and closures were supplied.
    pub fn build(self) -> Result<Command> {
        let action: Arc<dyn UndoableAction> = match (self.action, self.forward, self.reverse) {
            (Some(action), None, None) => action,
            (Some(_), _, _) => {
                return Err(UndoRedoError::validation_error(format!(
                    "command '{}' has both an action and closures",
                    self.text
                )))
            }
            (None, Some(forward), reverse) => Arc::new(ClosureAction { forward, reverse }),
            (None, None, _) => return Err(UndoRedoError::MissingForwardAction(self.text)),
        };

        Ok(Command {
            id: Uuid::new_v4(),
            text: self.text,
            kind: self.kind,
            scope: self.scope,
            stack: self.stack,
            created_at: Utc::now(),
            action,
            status: Arc::new(Mutex::new(CommandStatus::Pending)),
        })
    }
}
