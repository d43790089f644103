//! Progress reporting handed to running actions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::{EngineEvent, EventBus, ProgressEvent};

/// Sink an action reports progress through
///
/// Every report is forwarded, in call order, to the engine's event bus and
/// to the submitting caller's handle. Once the action has returned the
/// reporter is closed and later reports are dropped, so one command's
/// events never interleave with the next command's.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    command_id: Uuid,
    bus: Option<EventBus>,
    direct: Option<mpsc::UnboundedSender<ProgressEvent>>,
    open: Arc<AtomicBool>,
}

impl ProgressReporter {
    /// Reporter publishing onto `bus`
    pub fn new(command_id: Uuid, bus: EventBus) -> Self {
        Self {
            command_id,
            bus: Some(bus),
            direct: None,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Reporter that discards everything
    pub fn detached(command_id: Uuid) -> Self {
        Self {
            command_id,
            bus: None,
            direct: None,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Also forward reports to a per-job channel
    pub(crate) fn with_direct(mut self, direct: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.direct = Some(direct);
        self
    }

    /// Command this reporter belongs to
    pub fn command_id(&self) -> Uuid {
        self.command_id
    }

    /// Report that work has started
    pub fn started(&self) {
        self.emit(ProgressEvent::Started);
    }

    /// Report that work has finished
    pub fn finished(&self) {
        self.emit(ProgressEvent::Finished);
    }

    /// Report the bounds of the progress value
    pub fn range(&self, minimum: i64, maximum: i64) {
        self.emit(ProgressEvent::Range { minimum, maximum });
    }

    /// Report the current progress value
    pub fn value(&self, value: i64) {
        self.emit(ProgressEvent::Value(value));
    }

    /// Report a status text
    pub fn text(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::Text(text.into()));
    }

    /// Forward a progress event
    pub fn emit(&self, event: ProgressEvent) {
        if !self.is_open() {
            tracing::trace!(command_id = %self.command_id, ?event, "Dropping late progress report");
            return;
        }

        if let Some(direct) = &self.direct {
            let _ = direct.send(event.clone());
        }
        if let Some(bus) = &self.bus {
            bus.publish(EngineEvent::Progress {
                command_id: self.command_id,
                event,
            });
        }
    }

    /// Whether reports are still forwarded
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}
