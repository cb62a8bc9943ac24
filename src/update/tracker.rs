//! Lifecycle-driven check gating.
//!
//! [`StateTracker`] records every lifecycle transition and decides whether it
//! warrants a check: the app must come back to [`ACTIVE`] from
//! [`INACTIVE`] or [`BACKGROUND`], and the refresh window must have elapsed.
//! Failures on this path are always swallowed since no caller is positioned
//! to receive them.

use crate::lifecycle::{ACTIVE, BACKGROUND, INACTIVE, ListenerHandle};
use crate::update::orchestrator::UpdateOrchestrator;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of evaluating one lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    /// Back in the foreground and due: run the check sequence.
    Check,
    /// Back in the foreground, but inside the refresh window.
    SkipWithinWindow,
    /// Not a return to the foreground.
    Ignore,
}

/// Returns `true` if `label` denotes a backgrounded or transitioning app.
pub fn is_background_label(label: &str) -> bool {
    label.contains(INACTIVE) || label.contains(BACKGROUND)
}

/// Evaluates lifecycle transitions for one coordinator.
#[derive(Clone)]
pub struct StateTracker {
    orchestrator: UpdateOrchestrator,
}

impl StateTracker {
    pub(crate) fn new(orchestrator: UpdateOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub(crate) fn orchestrator(&self) -> &UpdateOrchestrator {
        &self.orchestrator
    }

    /// Record `next_state` and decide whether a check is warranted.
    ///
    /// The label is stored unconditionally. Does not run the check.
    pub fn record_transition(&self, next_state: &str) -> TransitionDecision {
        let orch = &self.orchestrator;
        let now = orch.clock().now_epoch_secs();

        let (is_back_to_app, is_due) = {
            let mut state = orch.state().lock();
            let came_from_background = is_background_label(&state.lifecycle_state);
            let went_to_active = next_state == ACTIVE;
            let is_due = state.is_due(now, orch.config().min_refresh_secs);
            state.lifecycle_state = next_state.to_owned();
            (came_from_background && went_to_active, is_due)
        };

        let need_check = is_back_to_app && is_due;
        orch.log().record(format!(
            "lifecycle transition: state={next_state}, need_to_check={need_check}"
        ));
        debug!(state = next_state, is_back_to_app, is_due, "lifecycle transition");

        if need_check {
            TransitionDecision::Check
        } else if is_back_to_app {
            orch.log()
                .record("lifecycle transition: skip check, within refresh window");
            TransitionDecision::SkipWithinWindow
        } else {
            TransitionDecision::Ignore
        }
    }

    /// Run the gated sequence: before-check hook, check/fetch/apply,
    /// after-check hook. Never fails.
    pub async fn run_check_sequence(&self) {
        let orch = &self.orchestrator;
        orch.hooks().before_check();

        // A pending handle is dropped on purpose: the apply runs detached.
        if let Err(e) = orch.apply_update_if_available(false).await {
            debug!(error = %e, "lifecycle-triggered update failed");
        }

        orch.hooks().after_check();
    }

    /// Record `next_state` and, if warranted, run the check sequence to
    /// completion.
    pub async fn on_lifecycle_transition(&self, next_state: &str) -> TransitionDecision {
        let decision = self.record_transition(next_state);
        if decision == TransitionDecision::Check {
            self.run_check_sequence().await;
        }
        decision
    }

    /// Consume `rx` on a spawned task until released or the source closes.
    ///
    /// Transitions are recorded in delivery order; each warranted check
    /// sequence runs on its own task, so overlapping sequences interleave.
    /// Labels dropped by a lagging receiver are never seen, so a lost
    /// background label means the next foreground return does not check.
    pub(crate) fn spawn_listener(
        &self,
        runtime: &tokio::runtime::Handle,
        mut rx: broadcast::Receiver<String>,
    ) -> ListenerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tracker = self.clone();

        let task = runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(next_state) => {
                            if tracker.record_transition(&next_state) == TransitionDecision::Check {
                                let sequence = tracker.clone();
                                tokio::spawn(async move { sequence.run_check_sequence().await });
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracker.orchestrator.log().record(format!(
                                "lifecycle listener lagged: {skipped} transitions dropped"
                            ));
                            warn!(skipped, "lifecycle listener lagged, transitions dropped");
                        }
                        Err(RecvError::Closed) => {
                            debug!("lifecycle source closed");
                            break;
                        }
                    },
                }
            }
        });

        ListenerHandle::new(cancel, task)
    }
}
