//! Progress events and the process-wide broadcaster.
//!
//! [`ProgressBroadcaster`] wraps a `tokio::sync::broadcast` channel. Publishing
//! never blocks: the event is copied into a shared ring and each listener
//! reads it at its own pace. A listener that falls more than `capacity`
//! events behind loses the oldest ones (it sees `RecvError::Lagged`) and the
//! publisher is never told. Listeners that subscribe after an event was
//! published do not see it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// A unit of progress for one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Overall completion in `[0, 100]`.
    pub progress: f32,
    /// Human-readable description of the current step.
    pub message: String,
    /// Set only on the terminal failure event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    /// A regular progress update. `progress` is clamped to `[0, 100]`.
    pub fn new(progress: f32, message: impl Into<String>) -> Self {
        Self {
            progress: clamp_percent(progress),
            message: message.into(),
            error: None,
        }
    }

    /// The terminal failure event: progress resets to 0 and `error` is set.
    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            progress: 0.0,
            message: message.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

fn clamp_percent(p: f32) -> f32 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 100.0)
    }
}

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// Messages pushed to progress-channel clients.
///
/// Serializes as `{"type":"progress","data":{...}}` or `{"type":"pong"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Progress(ProgressEvent),
    Pong,
}

impl From<ProgressEvent> for ServerMessage {
    fn from(event: ProgressEvent) -> Self {
        ServerMessage::Progress(event)
    }
}

// ---------------------------------------------------------------------------
// ProgressBroadcaster
// ---------------------------------------------------------------------------

/// Single fan-out channel shared by every conversion and every listener.
pub struct ProgressBroadcaster {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBroadcaster {
    /// Create a new broadcaster. `capacity` is the per-listener backlog
    /// before the oldest undelivered events are dropped for that listener.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new listener. It receives events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Deliver `event` to every connected listener.
    ///
    /// Returns the number of listeners the event was queued for. Having no
    /// listeners is not an error.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        tracing::trace!(progress = event.progress, message = %event.message, "progress");
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                tracing::trace!("No listeners for progress event");
                0
            }
        }
    }

    /// Number of currently connected listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
