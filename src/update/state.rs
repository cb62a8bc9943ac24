//! Coordinator state and time source.
//!
//! Tracks the last observed lifecycle label and the unix timestamp of the
//! last check. State lives only in memory; a process restart resets it.

use crate::lifecycle::UNKNOWN;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Source of the current unix time in seconds.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> u64;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Settable [`Clock`] for deterministic debounce behaviour.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now_epoch_secs: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now_epoch_secs)),
        }
    }

    pub fn set(&self, now_epoch_secs: u64) {
        self.now.store(now_epoch_secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Mutable coordinator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorState {
    /// Unix seconds of the last check; 0 means never checked.
    pub last_check_epoch: u64,
    /// Last observed lifecycle label.
    pub lifecycle_state: String,
}

impl CoordinatorState {
    /// Fresh state. `initial_label` falls back to [`UNKNOWN`].
    pub fn new(initial_label: Option<String>) -> Self {
        Self {
            last_check_epoch: 0,
            lifecycle_state: initial_label.unwrap_or_else(|| UNKNOWN.to_owned()),
        }
    }

    /// Record that a check started at `now`.
    ///
    /// Never moves the timestamp backwards, even if the clock does.
    pub fn mark_checked(&mut self, now: u64) {
        self.last_check_epoch = self.last_check_epoch.max(now);
    }

    /// Returns `true` if strictly more than `min_refresh_secs` have elapsed
    /// since the last check.
    pub fn is_due(&self, now: u64, min_refresh_secs: u64) -> bool {
        now.saturating_sub(self.last_check_epoch) > min_refresh_secs
    }
}

/// State shared between the tracker and the orchestrator of one coordinator.
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<Mutex<CoordinatorState>>);

impl SharedState {
    pub(crate) fn new(state: CoordinatorState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Serializable diagnostics view of a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub last_check_epoch: u64,
    pub lifecycle_state: String,
    pub log_records: Vec<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn new_state_never_checked() {
        let state = CoordinatorState::new(Some("active".to_owned()));
        assert_eq!(state.last_check_epoch, 0);
        assert_eq!(state.lifecycle_state, "active");
    }

    #[test]
    fn missing_label_uses_unknown() {
        let state = CoordinatorState::new(None);
        assert_eq!(state.lifecycle_state, UNKNOWN);
    }

    #[test]
    fn is_due_requires_strictly_greater_elapsed() {
        let mut state = CoordinatorState::new(None);
        state.mark_checked(1_000);
        assert!(!state.is_due(1_300, 300));
        assert!(state.is_due(1_301, 300));
    }

    #[test]
    fn initial_zero_counts_from_epoch() {
        let state = CoordinatorState::new(None);
        assert!(!state.is_due(10, 300));
        assert!(state.is_due(310, 300));
    }

    #[test]
    fn zero_window_is_due_after_any_elapsed_second() {
        let mut state = CoordinatorState::new(None);
        state.mark_checked(50);
        assert!(!state.is_due(50, 0));
        assert!(state.is_due(51, 0));
    }

    #[test]
    fn mark_checked_is_monotonic() {
        let mut state = CoordinatorState::new(None);
        state.mark_checked(500);
        state.mark_checked(400);
        assert_eq!(state.last_check_epoch, 500);
    }

    #[test]
    fn clock_behind_last_check_is_not_due() {
        let mut state = CoordinatorState::new(None);
        state.mark_checked(1_000);
        assert!(!state.is_due(900, 0));
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(10);
        let shared = clock.clone();
        clock.advance(5);
        assert_eq!(shared.now_epoch_secs(), 15);
        shared.set(100);
        assert_eq!(clock.now_epoch_secs(), 100);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_epoch_secs() > 1_577_836_800);
    }

    #[test]
    fn snapshot_serializes_field_names() {
        let snapshot = StateSnapshot {
            last_check_epoch: 310,
            lifecycle_state: "active".to_owned(),
            log_records: vec!["checked".to_owned()],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"last_check_epoch\":310"));
        let restored: StateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
