//! Caller-side view of a queued job

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::command::ActionResult;
use crate::error::UndoRedoError;
use crate::events::ProgressEvent;

/// Handle returned for every queued job
///
/// The job runs whether or not the handle is kept. Awaiting it yields the
/// job's terminal result; progress reports of the job's actions can be
/// drained in emission order while it runs.
#[derive(Debug)]
pub struct JobHandle {
    ticket: u64,
    command_id: Option<Uuid>,
    result: oneshot::Receiver<ActionResult>,
    progress: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl JobHandle {
    pub(crate) fn new(
        ticket: u64,
        command_id: Option<Uuid>,
        result: oneshot::Receiver<ActionResult>,
        progress: mpsc::UnboundedReceiver<ProgressEvent>,
    ) -> Self {
        Self {
            ticket,
            command_id,
            result,
            progress,
        }
    }

    /// Submission order number, unique per engine
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Submitted command, for enqueue jobs
    pub fn command_id(&self) -> Option<Uuid> {
        self.command_id
    }

    /// Wait for the job's result
    ///
    /// Jobs discarded by `clear()` or dropped at shutdown resolve to
    /// [`UndoRedoError::Cancelled`].
    pub async fn wait(self) -> ActionResult {
        self.result.await.unwrap_or(Err(UndoRedoError::Cancelled))
    }

    /// Blocking variant of [`JobHandle::wait`]
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait_blocking(self) -> ActionResult {
        self.result
            .blocking_recv()
            .unwrap_or(Err(UndoRedoError::Cancelled))
    }

    /// Next progress report; `None` once the job is over and drained
    pub async fn next_progress(&mut self) -> Option<ProgressEvent> {
        self.progress.recv().await
    }

    /// Progress reports received so far
    pub fn drain_progress(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.progress.try_recv() {
            events.push(event);
        }
        events
    }
}
