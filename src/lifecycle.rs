//! Application lifecycle signal source.
//!
//! The host bridges its native foreground/background notifications into a
//! [`LifecycleSource`]. Labels are opaque strings; only [`ACTIVE`],
//! [`INACTIVE`] and [`BACKGROUND`] carry meaning for the update tracker.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The app is in the foreground.
pub const ACTIVE: &str = "active";
/// The app is briefly transitioning (e.g. system dialog on top).
pub const INACTIVE: &str = "inactive";
/// The app is backgrounded.
pub const BACKGROUND: &str = "background";
/// Sentinel used when the source cannot report a state at construction.
pub const UNKNOWN: &str = "unknown";

/// Default broadcast capacity of [`LifecycleChannel`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Delivers lifecycle labels over time.
pub trait LifecycleSource: Send + Sync {
    /// The current label, if the platform can report one.
    fn current_state(&self) -> Option<String>;

    /// Subscribe to subsequent transitions.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

/// In-process [`LifecycleSource`] backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct LifecycleChannel {
    tx: broadcast::Sender<String>,
    current: Arc<Mutex<Option<String>>>,
}

impl Default for LifecycleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleChannel {
    /// Create a channel with no known current state.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a channel buffering up to `capacity` undelivered labels per
    /// subscriber. Slower subscribers lose the oldest labels.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a channel whose current state is `label`.
    pub fn with_current(label: impl Into<String>) -> Self {
        let channel = Self::new();
        channel.set_current(label);
        channel
    }

    /// Record `label` as the current state without notifying subscribers.
    pub fn set_current(&self, label: impl Into<String>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some(label.into());
    }

    /// Record `label` and deliver it to every subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, label: impl Into<String>) -> usize {
        let label = label.into();
        self.set_current(label.clone());
        // No subscribers is not an error.
        self.tx.send(label).unwrap_or(0)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl LifecycleSource for LifecycleChannel {
    fn current_state(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

/// Handle to a running lifecycle listener task.
///
/// Releasing stops delivery. Release is idempotent and also happens on drop.
#[derive(Debug)]
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop the listener. Later calls do nothing.
    pub fn release(&mut self) {
        self.cancel.cancel();
        self.task.take();
    }

    /// Whether [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Release and wait for the listener task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.release();
    }
}
