//! Threaded undo/redo engine
//!
//! The engine owns every [`Stack`], keeps them behind a short-lived
//! `RwLock`, and hands all command actions to one dedicated worker thread.
//! Callers submit work from any thread and get a [`JobHandle`] back
//! immediately.

mod handle;
mod state;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

pub use handle::JobHandle;

use crate::command::Command;
use crate::config::EngineConfig;
use crate::error::{Result, UndoRedoError};
use crate::events::{EngineEvent, EventBus};
use crate::scope::{has_scope, Scope, Scopes};
use crate::stack::{HistoryEntry, Stack, StackId};
use state::{EngineState, PendingEntry};
use worker::{Job, JobKind};

const WORKER_THREAD_NAME: &str = "rewind-undo-worker";

/// Coarse engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Nothing queued or running
    Idle,
    /// Jobs accepted but the worker has not picked any up
    Scheduling,
    /// The worker is running an action
    Executing,
}

/// State shared between the engine handle and its worker
pub(crate) struct Shared {
    state: RwLock<EngineState>,
    bus: EventBus,
    running: AtomicUsize,
    in_flight: AtomicBool,
}

/// Multi-stack undo/redo engine
pub struct Engine {
    shared: Arc<Shared>,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_ticket: AtomicU64,
}

impl Engine {
    /// Validate `config` and start the worker thread
    pub fn new(config: EngineConfig) -> Result<Self> {
        let scopes = config.validate()?;

        let mut routes = Vec::with_capacity(config.routes.len());
        for (name, stack) in &config.routes {
            routes.push((scopes.scope(name)?, StackId::new(stack.clone())));
        }

        let state = EngineState::new(
            scopes,
            config.default_stack_id(),
            config.undo_limit,
            routes,
        );
        let shared = Arc::new(Shared {
            state: RwLock::new(state),
            bus: EventBus::with_capacity(config.event_capacity),
            running: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(worker::run(worker_shared, receiver)))?;

        info!(
            undo_limit = config.undo_limit,
            scopes = config.scopes.len(),
            default_stack = %config.default_stack,
            "Undo/redo engine started"
        );

        Ok(Self {
            shared,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            next_ticket: AtomicU64::new(1),
        })
    }

    /// Queue `command` for execution
    ///
    /// The scope is checked against the registry before anything is
    /// scheduled. On success a mutating command is pushed onto its stack;
    /// failures and query commands leave history untouched.
    pub fn enqueue(&self, command: Command) -> Result<JobHandle> {
        let command_id = command.id();
        let text = command.text().to_string();

        self.submit(Some(command_id), |state, ticket| {
            state.scopes.validate(command.scope())?;
            let stack = state.resolve_stack(&command);
            debug!(
                ticket,
                command_id = %command_id,
                command = %text,
                stack = %stack,
                "Command queued"
            );
            state.pending.push_back(PendingEntry {
                ticket,
                text: text.clone(),
                scope: command.scope(),
                stack: stack.clone(),
            });
            Ok(JobKind::Execute { command, stack })
        })
    }

    /// Queue an undo
    ///
    /// Without a filter the active stack is undone; with one, the most
    /// recently touched stack whose next undo matches the filter.
    pub fn undo(&self, filter: Option<Scope>) -> Result<JobHandle> {
        self.submit(None, |state, _| {
            if let Some(filter) = filter {
                state.scopes.validate(filter)?;
            }
            Ok(JobKind::Undo { filter })
        })
    }

    /// Queue a redo; stack selection mirrors [`Engine::undo`]
    pub fn redo(&self, filter: Option<Scope>) -> Result<JobHandle> {
        self.submit(None, |state, _| {
            if let Some(filter) = filter {
                state.scopes.validate(filter)?;
            }
            Ok(JobKind::Redo { filter })
        })
    }

    /// Queue a move of the active stack's cursor
    ///
    /// `None` reverses everything. Each command between the current and
    /// target position is reversed or replayed in order; the walk stops at
    /// the first failure.
    pub fn set_current_index(&self, target: Option<usize>) -> Result<JobHandle> {
        self.submit(None, |_, _| Ok(JobKind::Jump { target }))
    }

    fn submit<F>(&self, command_id: Option<uuid::Uuid>, build: F) -> Result<JobHandle>
    where
        F: FnOnce(&mut EngineState, u64) -> Result<JobKind>,
    {
        let sender_guard = self.sender.lock();
        let sender = sender_guard.as_ref().ok_or(UndoRedoError::EngineShutdown)?;

        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let (reply, result) = oneshot::channel();
        let (progress, progress_rx) = mpsc::unbounded_channel();

        let mut state = self.shared.state.write();
        let kind = build(&mut *state, ticket)?;
        let generation = state.generation;

        self.shared.running.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            ticket,
            generation,
            kind,
            reply,
            progress,
        };
        if sender.send(job).is_err() {
            self.shared.running.fetch_sub(1, Ordering::SeqCst);
            state.pending.retain(|entry| entry.ticket != ticket);
            return Err(UndoRedoError::EngineShutdown);
        }

        Ok(JobHandle::new(ticket, command_id, result, progress_rx))
    }

    /// Drop every stack's history and discard waiting jobs
    ///
    /// Discarded jobs resolve to [`UndoRedoError::Cancelled`]. A command
    /// already running finishes but is not recorded.
    pub fn clear(&self) {
        {
            let mut state = self.shared.state.write();
            state.generation += 1;
            let discarded = state.pending.len();
            state.pending.clear();
            for stack in state.stacks.values_mut() {
                stack.clear();
            }
            info!(discarded, "Undo/redo history cleared");
        }
        self.shared.bus.publish(EngineEvent::StateChanged);
    }

    /// Change the per-stack history limit (0 = unlimited)
    ///
    /// Stacks already over the new limit are trimmed right away.
    pub fn set_undo_limit(&self, limit: usize) {
        let dropped: usize = {
            let mut state = self.shared.state.write();
            state.undo_limit = limit;
            state
                .stacks
                .values_mut()
                .map(|stack| stack.truncate_to_limit(limit))
                .sum()
        };
        debug!(limit, dropped, "Undo limit changed");
        if dropped > 0 {
            self.shared.bus.publish(EngineEvent::StateChanged);
        }
    }

    /// Current per-stack history limit
    pub fn undo_limit(&self) -> usize {
        self.shared.state.read().undo_limit
    }

    /// Make `stack` the active stack, or the default one for `None`
    pub fn set_active_stack(&self, stack: Option<StackId>) {
        {
            let mut state = self.shared.state.write();
            let id = stack.unwrap_or_else(|| state.default_stack.clone());
            state.stack_mut(&id);
            debug!(stack = %id, "Active stack changed");
            state.active = id;
        }
        self.shared.bus.publish(EngineEvent::StateChanged);
    }

    /// Identity of the active stack
    pub fn active_stack_id(&self) -> StackId {
        self.shared.state.read().active.clone()
    }

    /// Send commands of `scope` that name no stack to `stack`
    ///
    /// Routes are consulted in the order they were added.
    pub fn route_scope(&self, scope: Scope, stack: impl Into<StackId>) -> Result<()> {
        let stack = stack.into();
        let mut state = self.shared.state.write();
        state.scopes.validate(scope)?;
        if scope.is_all() || scope.is_empty() {
            return Err(UndoRedoError::validation_error(
                "routes need a specific, non-empty scope",
            ));
        }
        state.routes.retain(|(existing, _)| *existing != scope);
        state.routes.push((scope, stack));
        Ok(())
    }

    /// Texts of waiting commands bound for the active stack and matching `filter`
    pub fn queued_command_text_list_by_scope(&self, filter: Scope) -> Vec<String> {
        let state = self.shared.state.read();
        state
            .pending
            .iter()
            .filter(|entry| entry.stack == state.active && has_scope(filter, entry.scope))
            .map(|entry| entry.text.clone())
            .collect()
    }

    /// Whether any job is queued or running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst) > 0
    }

    /// Coarse engine state
    pub fn status(&self) -> EngineStatus {
        if self.shared.in_flight.load(Ordering::SeqCst) {
            EngineStatus::Executing
        } else if self.is_running() {
            EngineStatus::Scheduling
        } else {
            EngineStatus::Idle
        }
    }

    /// Whether the active stack has something to undo
    pub fn can_undo(&self) -> bool {
        self.with_active(|stack| stack.can_step_backward())
            .unwrap_or(false)
    }

    /// Whether the active stack has something to redo
    pub fn can_redo(&self) -> bool {
        self.with_active(|stack| stack.can_step_forward())
            .unwrap_or(false)
    }

    /// Text of the command an undo would reverse
    pub fn undo_text(&self) -> Option<String> {
        self.with_active(|stack| stack.undo_text().map(str::to_string))
            .flatten()
    }

    /// Text of the command a redo would replay
    pub fn redo_text(&self) -> Option<String> {
        self.with_active(|stack| stack.redo_text().map(str::to_string))
            .flatten()
    }

    /// Texts of the active stack in history order
    pub fn text_list(&self) -> Vec<String> {
        self.with_active(|stack| stack.texts()).unwrap_or_default()
    }

    /// History entries of the active stack
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.with_active(|stack| stack.entries())
            .unwrap_or_default()
    }

    /// Index of the last applied command on the active stack
    pub fn current_index(&self) -> Option<usize> {
        self.with_active(|stack| stack.current_index()).flatten()
    }

    /// Number of commands in the active stack
    pub fn count(&self) -> usize {
        self.with_active(|stack| stack.count()).unwrap_or(0)
    }

    /// Every known stack, sorted
    pub fn stack_ids(&self) -> Vec<StackId> {
        let state = self.shared.state.read();
        let mut ids: Vec<StackId> = state.stacks.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Copy of the scope registry
    pub fn scopes(&self) -> Scopes {
        self.shared.state.read().scopes.clone()
    }

    /// Receive every future engine event
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.bus.subscribe()
    }

    /// Close the queue, let the worker drain it, and join the thread
    ///
    /// Later submissions fail with [`UndoRedoError::EngineShutdown`].
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            warn!("Engine shut down from its own worker; not joining");
            return;
        }
        if worker.join().is_err() {
            warn!("Undo/redo worker thread panicked");
        }
    }

    fn with_active<T>(&self, read: impl FnOnce(&Stack) -> T) -> Option<T> {
        self.shared.state.read().active_stack().map(read)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("status", &self.status())
            .field("active_stack", &self.active_stack_id())
            .finish()
    }
}
