//! The single worker that runs every command action
//!
//! Jobs arrive over an unbounded FIFO channel and run one at a time, so no
//! two actions are ever in flight together. The state lock is taken only
//! around bookkeeping, never across an action's `.await`.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::Shared;
use crate::command::{ActionResult, Command};
use crate::error::{Result, UndoRedoError};
use crate::events::{EngineEvent, Operation, ProgressEvent};
use crate::progress::ProgressReporter;
use crate::scope::Scope;
use crate::stack::StackId;

/// What a queued job should do
pub(crate) enum JobKind {
    Execute { command: Command, stack: StackId },
    Undo { filter: Option<Scope> },
    Redo { filter: Option<Scope> },
    Jump { target: Option<usize> },
}

/// A unit of work for the worker
pub(crate) struct Job {
    pub ticket: u64,
    pub generation: u64,
    pub kind: JobKind,
    pub reply: oneshot::Sender<ActionResult>,
    pub progress: mpsc::UnboundedSender<ProgressEvent>,
}

enum Step {
    Backward(Command),
    Forward(Command),
}

/// Drain the job queue until every sender is gone
pub(crate) async fn run(shared: Arc<Shared>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    info!("Undo/redo worker started");

    while let Some(job) = jobs.recv().await {
        let Job {
            ticket,
            generation,
            kind,
            reply,
            progress,
        } = job;

        shared.in_flight.store(true, Ordering::SeqCst);
        let result = shared.process(ticket, generation, kind, progress).await;
        shared.in_flight.store(false, Ordering::SeqCst);
        shared.running.fetch_sub(1, Ordering::SeqCst);

        // The caller may have dropped its handle
        let _ = reply.send(result);
    }

    info!("Undo/redo worker stopped");
}

impl Shared {
    async fn process(
        &self,
        ticket: u64,
        generation: u64,
        kind: JobKind,
        progress: mpsc::UnboundedSender<ProgressEvent>,
    ) -> ActionResult {
        if self.state.read().generation != generation {
            debug!(ticket, "Skipping job discarded by clear");
            return Err(UndoRedoError::Cancelled);
        }

        match kind {
            JobKind::Execute { command, stack } => {
                self.execute(ticket, generation, command, stack, progress)
                    .await
            }
            JobKind::Undo { filter } => {
                let target = self.state.read().undo_target(filter);
                let (stack, command) = target.ok_or(UndoRedoError::NoMoreUndos)?;
                self.step_backward(generation, &stack, command, &progress)
                    .await
            }
            JobKind::Redo { filter } => {
                let target = self.state.read().redo_target(filter);
                let (stack, command) = target.ok_or(UndoRedoError::NoMoreRedos)?;
                self.step_forward(generation, &stack, command, &progress)
                    .await
            }
            JobKind::Jump { target } => self.jump(generation, target, &progress).await,
        }
    }

    async fn execute(
        &self,
        ticket: u64,
        generation: u64,
        command: Command,
        stack_id: StackId,
        progress: mpsc::UnboundedSender<ProgressEvent>,
    ) -> ActionResult {
        self.state.write().pending.retain(|entry| entry.ticket != ticket);

        debug!(
            command_id = %command.id(),
            command = %command.text(),
            stack = %stack_id,
            scope = %command.scope(),
            "Executing command"
        );

        let reporter = ProgressReporter::new(command.id(), self.bus.clone()).with_direct(progress);
        let result = command.execute(&reporter).await;

        let mut recorded = false;
        match &result {
            Ok(_) if command.is_query() => {}
            Ok(_) => recorded = self.record(generation, &stack_id, &command),
            Err(e) => warn!(
                command_id = %command.id(),
                command = %command.text(),
                error = %e,
                "Command failed; not recorded in history"
            ),
        }

        self.complete(&command, Operation::Execute, &result);
        if recorded {
            self.bus.publish(EngineEvent::StateChanged);
        }
        result
    }

    fn record(&self, generation: u64, stack_id: &StackId, command: &Command) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            warn!(
                command_id = %command.id(),
                "History cleared while command was running; not recording"
            );
            return false;
        }

        let limit = state.undo_limit;
        let sequence = state.next_sequence();
        let stack = state.stack_mut(stack_id);
        stack.push(command.clone());
        let dropped = stack.truncate_to_limit(limit);
        stack.touch(sequence);

        if dropped > 0 {
            debug!(stack = %stack_id, dropped, limit, "Trimmed history to undo limit");
        }
        true
    }

    async fn step_backward(
        &self,
        generation: u64,
        stack_id: &StackId,
        command: Command,
        progress: &mpsc::UnboundedSender<ProgressEvent>,
    ) -> ActionResult {
        let scope = command.scope();
        self.bus.publish(EngineEvent::Undoing {
            scope,
            active: true,
        });
        debug!(command_id = %command.id(), stack = %stack_id, "Undoing command");

        let reporter =
            ProgressReporter::new(command.id(), self.bus.clone()).with_direct(progress.clone());
        let result = command.reverse(&reporter).await;

        let moved =
            result.is_ok() && self.move_cursor(generation, stack_id, &command, false);

        self.bus.publish(EngineEvent::Undoing {
            scope,
            active: false,
        });
        self.complete(&command, Operation::Undo, &result);
        if moved {
            self.bus.publish(EngineEvent::StateChanged);
        }
        result
    }

    async fn step_forward(
        &self,
        generation: u64,
        stack_id: &StackId,
        command: Command,
        progress: &mpsc::UnboundedSender<ProgressEvent>,
    ) -> ActionResult {
        let scope = command.scope();
        self.bus.publish(EngineEvent::Redoing {
            scope,
            active: true,
        });
        debug!(command_id = %command.id(), stack = %stack_id, "Redoing command");

        let reporter =
            ProgressReporter::new(command.id(), self.bus.clone()).with_direct(progress.clone());
        let result = command.execute(&reporter).await;

        let moved =
            result.is_ok() && self.move_cursor(generation, stack_id, &command, true);

        self.bus.publish(EngineEvent::Redoing {
            scope,
            active: false,
        });
        self.complete(&command, Operation::Redo, &result);
        if moved {
            self.bus.publish(EngineEvent::StateChanged);
        }
        result
    }

    /// Step the cursor over `command`, provided it is still the neighbour
    ///
    /// The undo limit can change while an action runs, so the slot next to
    /// the cursor is checked against the command that actually ran.
    fn move_cursor(
        &self,
        generation: u64,
        stack_id: &StackId,
        command: &Command,
        forward: bool,
    ) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            return false;
        }
        let sequence = state.next_sequence();
        let stack = match state.stacks.get_mut(stack_id) {
            Some(stack) => stack,
            None => return false,
        };

        let neighbour = if forward {
            stack.redo_command()
        } else {
            stack.undo_command()
        };
        if neighbour.map(Command::id) != Some(command.id()) {
            warn!(
                command_id = %command.id(),
                stack = %stack_id,
                forward,
                "Command left the history while running; cursor unchanged"
            );
            return false;
        }

        let moved = if forward {
            stack.step_forward()
        } else {
            stack.step_backward()
        };
        stack.touch(sequence);
        moved
    }

    async fn jump(
        &self,
        generation: u64,
        target: Option<usize>,
        progress: &mpsc::UnboundedSender<ProgressEvent>,
    ) -> ActionResult {
        let (stack_id, count) = {
            let state = self.state.read();
            let count = state.active_stack().map_or(0, |stack| stack.count());
            (state.active.clone(), count)
        };

        if let Some(index) = target {
            if index >= count {
                return Err(UndoRedoError::IndexOutOfRange { index, count });
            }
        }
        let wanted = target.map_or(0, |index| index + 1);

        loop {
            match self.next_step(&stack_id, wanted)? {
                Some(Step::Backward(command)) => {
                    self.step_backward(generation, &stack_id, command, progress)
                        .await?;
                }
                Some(Step::Forward(command)) => {
                    self.step_forward(generation, &stack_id, command, progress)
                        .await?;
                }
                None => break,
            }
            if self.state.read().generation != generation {
                return Err(UndoRedoError::Cancelled);
            }
        }

        Ok(serde_json::json!({ "current_index": target }))
    }

    fn next_step(&self, stack_id: &StackId, wanted: usize) -> Result<Option<Step>> {
        let state = self.state.read();
        let stack = match state.stacks.get(stack_id) {
            Some(stack) => stack,
            None => return Ok(None),
        };
        let applied = stack.current_index().map_or(0, |index| index + 1);

        let step = if applied > wanted {
            let command = stack.undo_command().ok_or(UndoRedoError::NoMoreUndos)?;
            Some(Step::Backward(command.clone()))
        } else if applied < wanted {
            let command = stack.redo_command().ok_or(UndoRedoError::NoMoreRedos)?;
            Some(Step::Forward(command.clone()))
        } else {
            None
        };
        Ok(step)
    }

    fn complete(&self, command: &Command, operation: Operation, result: &ActionResult) {
        self.bus.publish(EngineEvent::Completed {
            command_id: command.id(),
            text: command.text().to_string(),
            operation,
            error: result.as_ref().err().map(ToString::to_string),
        });
    }
}
