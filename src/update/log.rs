//! Append-only decision log.
//!
//! Every decision point of the coordinator lands here as a human-readable
//! record. When console mirroring is enabled and the build keeps debug
//! assertions, records are also forwarded to the `tracing` subscriber.

use std::sync::{Arc, Mutex};

/// Shared, append-only sequence of log records.
///
/// Clones share the same underlying sequence.
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    records: Arc<Mutex<Vec<String>>>,
    mirror: bool,
}

impl UpdateLog {
    /// Create an empty log. `mirror` enables console forwarding.
    pub fn new(mirror: bool) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            mirror: mirror && cfg!(debug_assertions),
        }
    }

    /// Append a record. Never fails.
    pub fn record(&self, message: impl Into<String>) {
        let message = message.into();
        if self.mirror {
            tracing::info!(target: "app_updater", "{message}");
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }

    /// Snapshot of all records in emission order.
    pub fn records(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of records so far.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
