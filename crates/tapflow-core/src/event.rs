//! Progress event distribution for runs.
//!
//! The engine publishes [`ProgressEvent`]s as it interprets a plan;
//! renderers (console output, JSON lines, logging) consume them through an
//! [`EventStream`]. The engine never blocks on presentation: with nobody
//! watching, publishing is a no-op, and a consumer that falls behind skips
//! ahead instead of stalling the run.

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use tapflow_types::defaults::EVENT_BUS_CAPACITY;
use tapflow_types::event::ProgressEvent;

/// Fan-out channel for run progress events.
///
/// Cloning shares the channel; the controller and every engine component
/// publish through clones of the one bus the run was started with.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    /// A bus buffering one run's worth of unrendered progress
    /// ([`EVENT_BUS_CAPACITY`] events per consumer).
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY)
    }

    /// A bus with an explicit buffer size; pressure tests use tiny ones.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to whoever is watching. Dropped silently when nobody is.
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    /// Start watching events published from now on.
    pub fn watch(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One consumer's view of the bus.
///
/// Wraps the broadcast receiver so consumers never see lag errors: a gap
/// left by falling behind is logged and skipped, and `None` means the bus
/// is gone and no more events will come.
pub struct EventStream {
    receiver: broadcast::Receiver<ProgressEvent>,
}

impl EventStream {
    /// Wait for the next event.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event consumer fell behind, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next event belonging to `run_id`, discarding events of
    /// earlier runs still sitting in the buffer.
    pub async fn next_for(&mut self, run_id: Uuid) -> Option<ProgressEvent> {
        while let Some(event) = self.next().await {
            if event.run_id() == run_id {
                return Some(event);
            }
        }
        None
    }

    /// Already-delivered events, without waiting. Used to inspect what a
    /// finished run published.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
