//! Check → fetch → apply sequencing.
//!
//! [`UpdateOrchestrator`] runs the three provider phases in order, enforces
//! the development-sandbox short-circuit and applies the configured error
//! policy. It is cheap to clone; clones share state, log and provider.

use crate::config::{UpdateHooks, UpdaterConfig};
use crate::error::{ProviderError, Result, UpdaterError};
use crate::update::log::UpdateLog;
use crate::update::provider::{UpdateCheck, UpdateProvider};
use crate::update::state::{Clock, SharedState};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Result of [`UpdateOrchestrator::apply_update_if_available`].
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The check reported no update and the call was not forced.
    NotAvailable,
    /// Development sandbox: the provider was not contacted.
    Skipped,
    /// Fetch and apply both returned. The provider did not restart the process.
    Applied,
    /// Fetch or apply failed and the failure was swallowed.
    Failed(String),
    /// Fetch and apply were launched detached (`await_apply = false`).
    Pending(JoinHandle<Result<ApplyOutcome>>),
}

impl ApplyOutcome {
    /// Wait for a [`Pending`](Self::Pending) outcome to finish. Other
    /// outcomes are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the detached task's error, or [`UpdaterError::ApplyFailed`]
    /// if the task panicked or was aborted.
    pub async fn settle(self) -> Result<ApplyOutcome> {
        match self {
            Self::Pending(task) => task
                .await
                .map_err(|e| UpdaterError::ApplyFailed(format!("apply task did not finish: {e}")))?,
            other => Ok(other),
        }
    }

    /// Whether fetch and apply are still running detached.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Runs the provider phases for one coordinator.
#[derive(Clone)]
pub struct UpdateOrchestrator {
    config: UpdaterConfig,
    provider: Arc<dyn UpdateProvider>,
    hooks: UpdateHooks,
    clock: Arc<dyn Clock>,
    state: SharedState,
    log: UpdateLog,
}

impl UpdateOrchestrator {
    pub(crate) fn new(
        config: UpdaterConfig,
        provider: Arc<dyn UpdateProvider>,
        hooks: UpdateHooks,
        clock: Arc<dyn Clock>,
        state: SharedState,
        log: UpdateLog,
    ) -> Self {
        Self {
            config,
            provider,
            hooks,
            clock,
            state,
            log,
        }
    }

    pub(crate) fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub(crate) fn hooks(&self) -> &UpdateHooks {
        &self.hooks
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn state(&self) -> &SharedState {
        &self.state
    }

    pub(crate) fn log(&self) -> &UpdateLog {
        &self.log
    }

    /// Ask the provider whether a newer bundle exists.
    ///
    /// Consumes the refresh window before contacting the provider, so a slow
    /// or failing check still counts as a check.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::CheckFailed`] if the provider fails and
    /// `throw_on_error` is set.
    pub async fn check_for_update(&self) -> Result<UpdateCheck> {
        let now = self.clock.now_epoch_secs();
        self.state.lock().mark_checked(now);

        if self.config.dev_sandbox {
            self.log
                .record("check_for_update: unable to check for update in development sandbox");
            return Ok(UpdateCheck::default());
        }

        match self.provider.check_for_update().await {
            Ok(check) => {
                self.log
                    .record(format!("check_for_update: available={}", check.is_available));
                Ok(check)
            }
            Err(e) => {
                self.log
                    .record(format!("check_for_update: ERROR: {}", e.message()));
                warn!(error = %e, "update check failed");
                if self.config.throw_on_error {
                    return Err(e.into());
                }
                Ok(UpdateCheck::default())
            }
        }
    }

    /// Check, then fetch and apply if an update is available or `force` is set.
    ///
    /// The sandbox short-circuit and the before-download hook always run
    /// before this call returns. With `await_apply = false` the fetch and
    /// apply provider calls then run on a spawned task and the call returns
    /// [`ApplyOutcome::Pending`].
    ///
    /// # Errors
    ///
    /// Propagates [`UpdaterError::CheckFailed`] from the check, and
    /// [`UpdaterError::ApplyFailed`] from an awaited fetch or apply, when
    /// `throw_on_error` is set.
    pub async fn apply_update_if_available(&self, force: bool) -> Result<ApplyOutcome> {
        let check = self.check_for_update().await?;

        if !check.is_available && !force {
            self.log.record("apply_update_if_available: No update");
            return Ok(ApplyOutcome::NotAvailable);
        }

        if check.is_available {
            self.log.record("apply_update_if_available: Doing update");
        } else {
            self.log
                .record("apply_update_if_available: Doing update (forced)");
        }

        if self.config.dev_sandbox {
            self.log
                .record("apply_update_if_available: unable to update in development sandbox");
            return Ok(ApplyOutcome::Skipped);
        }

        self.hooks.before_download();

        if self.config.await_apply {
            return self.fetch_and_apply().await;
        }

        let this = self.clone();
        let task = tokio::spawn(async move { this.fetch_and_apply().await });
        Ok(ApplyOutcome::Pending(task))
    }

    /// Same as `apply_update_if_available(true)`.
    ///
    /// # Errors
    ///
    /// See [`apply_update_if_available`](Self::apply_update_if_available).
    pub async fn force_apply_update(&self) -> Result<ApplyOutcome> {
        self.apply_update_if_available(true).await
    }

    async fn fetch_and_apply(&self) -> Result<ApplyOutcome> {
        self.log.record("fetch_and_apply: fetching update");
        if let Err(e) = self.provider.fetch_update().await {
            return self.apply_failure(e);
        }

        self.log.record("fetch_and_apply: update fetched, applying");
        if let Err(e) = self.provider.apply_update().await {
            return self.apply_failure(e);
        }

        // Reaching here means the provider did not restart the process.
        debug!("apply returned without restarting");
        self.log
            .record("fetch_and_apply: apply returned without restart");
        Ok(ApplyOutcome::Applied)
    }

    fn apply_failure(&self, err: ProviderError) -> Result<ApplyOutcome> {
        let message = err.message().to_owned();
        self.log.record(format!("fetch_and_apply: ERROR: {message}"));
        warn!(error = %err, "update fetch/apply failed");
        if self.config.throw_on_error {
            return Err(UpdaterError::ApplyFailed(message));
        }
        Ok(ApplyOutcome::Failed(message))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::update::provider::{CALL_APPLY, CALL_CHECK, CALL_FETCH, ScriptedProvider};
    use crate::update::state::{CoordinatorState, ManualClock};
    use std::sync::Mutex;

    fn orchestrator(
        config: UpdaterConfig,
        provider: &ScriptedProvider,
        hooks: UpdateHooks,
        clock: &ManualClock,
    ) -> UpdateOrchestrator {
        UpdateOrchestrator::new(
            config,
            Arc::new(provider.clone()),
            hooks,
            Arc::new(clock.clone()),
            SharedState::new(CoordinatorState::new(None)),
            UpdateLog::new(false),
        )
    }

    fn awaited() -> UpdaterConfig {
        UpdaterConfig {
            await_apply: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn check_marks_window_before_contacting_provider() {
        let provider = ScriptedProvider::new(true);
        provider.fail_check(Some("offline"));
        let clock = ManualClock::new(1_000);
        let orch = orchestrator(UpdaterConfig::default(), &provider, UpdateHooks::new(), &clock);

        let check = orch.check_for_update().await.unwrap();
        assert!(!check.is_available);
        assert_eq!(orch.state().lock().last_check_epoch, 1_000);
        assert!(orch.log().records().iter().any(|r| r.contains("ERROR: offline")));
    }

    #[tokio::test]
    async fn check_failure_propagates_when_throwing() {
        let provider = ScriptedProvider::new(true);
        provider.fail_check(Some("503 from update server"));
        let clock = ManualClock::new(5);
        let config = UpdaterConfig {
            throw_on_error: true,
            ..Default::default()
        };
        let orch = orchestrator(config, &provider, UpdateHooks::new(), &clock);

        let err = orch.check_for_update().await.unwrap_err();
        assert!(matches!(err, UpdaterError::CheckFailed(ref m) if m == "503 from update server"));
        assert_eq!(orch.state().lock().last_check_epoch, 5);
    }

    #[tokio::test]
    async fn check_failure_stops_apply_when_throwing() {
        let provider = ScriptedProvider::new(true);
        provider.fail_check(Some("dns"));
        let clock = ManualClock::new(5);
        let config = UpdaterConfig {
            throw_on_error: true,
            await_apply: true,
            ..Default::default()
        };
        let orch = orchestrator(config, &provider, UpdateHooks::new(), &clock);

        assert!(orch.force_apply_update().await.is_err());
        assert_eq!(provider.calls(), vec![CALL_CHECK]);
    }

    #[tokio::test]
    async fn sandbox_never_contacts_provider() {
        let provider = ScriptedProvider::new(true);
        let clock = ManualClock::new(77);
        let config = UpdaterConfig {
            dev_sandbox: true,
            await_apply: true,
            ..Default::default()
        };
        let orch = orchestrator(config, &provider, UpdateHooks::new(), &clock);

        assert!(!orch.check_for_update().await.unwrap().is_available);
        assert!(matches!(
            orch.apply_update_if_available(false).await.unwrap(),
            ApplyOutcome::NotAvailable
        ));
        assert!(matches!(
            orch.force_apply_update().await.unwrap(),
            ApplyOutcome::Skipped
        ));
        assert!(provider.calls().is_empty());
        assert_eq!(orch.state().lock().last_check_epoch, 77);
        assert!(
            orch.log()
                .records()
                .iter()
                .any(|r| r.contains("development sandbox"))
        );
    }

    #[tokio::test]
    async fn no_update_skips_fetch_and_download_hook() {
        let provider = ScriptedProvider::new(false);
        let clock = ManualClock::new(1);
        let downloads = Arc::new(Mutex::new(0));
        let d = Arc::clone(&downloads);
        let hooks = UpdateHooks::new().with_before_download(move || *d.lock().unwrap() += 1);
        let orch = orchestrator(awaited(), &provider, hooks, &clock);

        let outcome = orch.apply_update_if_available(false).await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::NotAvailable));
        assert_eq!(provider.calls(), vec![CALL_CHECK]);
        assert_eq!(*downloads.lock().unwrap(), 0);
        assert_eq!(
            orch.log().records().last().map(String::as_str),
            Some("apply_update_if_available: No update")
        );
    }

    #[tokio::test]
    async fn available_update_runs_all_phases_in_order() {
        let provider = ScriptedProvider::new(true);
        let journal = provider.journal();
        let clock = ManualClock::new(1);
        let j = Arc::clone(&journal);
        let hooks = UpdateHooks::new()
            .with_before_download(move || j.lock().unwrap().push("before_download".to_owned()));
        let orch = orchestrator(awaited(), &provider, hooks, &clock);

        let outcome = orch.apply_update_if_available(false).await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied));
        assert_eq!(
            provider.calls(),
            vec![CALL_CHECK, "before_download", CALL_FETCH, CALL_APPLY]
        );
    }

    #[tokio::test]
    async fn force_applies_even_when_unavailable() {
        let provider = ScriptedProvider::new(false);
        let clock = ManualClock::new(900);
        let orch = orchestrator(awaited(), &provider, UpdateHooks::new(), &clock);

        let outcome = orch.force_apply_update().await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied));
        assert_eq!(provider.calls(), vec![CALL_CHECK, CALL_FETCH, CALL_APPLY]);
        assert_eq!(orch.state().lock().last_check_epoch, 900);
    }

    #[tokio::test]
    async fn fetch_failure_is_swallowed_by_default() {
        let provider = ScriptedProvider::new(true);
        provider.fail_fetch(Some("connection reset"));
        let clock = ManualClock::new(1);
        let orch = orchestrator(awaited(), &provider, UpdateHooks::new(), &clock);

        let outcome = orch.apply_update_if_available(false).await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Failed(ref m) if m == "connection reset"));
        assert_eq!(provider.count(CALL_APPLY), 0);
    }

    #[tokio::test]
    async fn apply_failure_propagates_when_throwing() {
        let provider = ScriptedProvider::new(true);
        provider.fail_apply(Some("bundle rejected"));
        let clock = ManualClock::new(1);
        let config = UpdaterConfig {
            throw_on_error: true,
            await_apply: true,
            ..Default::default()
        };
        let orch = orchestrator(config, &provider, UpdateHooks::new(), &clock);

        let err = orch.apply_update_if_available(false).await.unwrap_err();
        assert!(matches!(err, UpdaterError::ApplyFailed(ref m) if m == "bundle rejected"));
    }

    #[tokio::test]
    async fn detached_apply_returns_pending_handle() {
        let provider = ScriptedProvider::new(true);
        let clock = ManualClock::new(1);
        let orch = orchestrator(UpdaterConfig::default(), &provider, UpdateHooks::new(), &clock);

        let outcome = orch.apply_update_if_available(false).await.unwrap();
        assert!(outcome.is_pending());
        let settled = outcome.settle().await.unwrap();
        assert!(matches!(settled, ApplyOutcome::Applied));
        assert_eq!(provider.count(CALL_FETCH), 1);
    }

    #[tokio::test]
    async fn detached_apply_runs_download_hook_before_returning() {
        let provider = ScriptedProvider::new(true);
        let journal = provider.journal();
        let clock = ManualClock::new(1);
        let j = Arc::clone(&journal);
        let hooks = UpdateHooks::new()
            .with_before_download(move || j.lock().unwrap().push("before_download".to_owned()));
        let orch = orchestrator(UpdaterConfig::default(), &provider, hooks, &clock);

        let outcome = orch.apply_update_if_available(false).await.unwrap();
        assert!(outcome.is_pending());
        assert_eq!(provider.calls()[..2], [CALL_CHECK, "before_download"]);

        outcome.settle().await.unwrap();
        assert_eq!(
            provider.calls(),
            vec![CALL_CHECK, "before_download", CALL_FETCH, CALL_APPLY]
        );
    }

    #[tokio::test]
    async fn detached_sandbox_skips_without_spawning() {
        let provider = ScriptedProvider::new(true);
        let clock = ManualClock::new(1);
        let config = UpdaterConfig {
            dev_sandbox: true,
            ..Default::default()
        };
        let orch = orchestrator(config, &provider, UpdateHooks::new(), &clock);

        let outcome = orch.force_apply_update().await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Skipped));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn detached_apply_error_surfaces_through_handle() {
        let provider = ScriptedProvider::new(true);
        provider.fail_fetch(Some("disk full"));
        let clock = ManualClock::new(1);
        let config = UpdaterConfig {
            throw_on_error: true,
            ..Default::default()
        };
        let orch = orchestrator(config, &provider, UpdateHooks::new(), &clock);

        let outcome = orch.apply_update_if_available(false).await.unwrap();
        let err = outcome.settle().await.unwrap_err();
        assert!(matches!(err, UpdaterError::ApplyFailed(ref m) if m == "disk full"));
    }

    #[tokio::test]
    async fn settle_passes_through_finished_outcomes() {
        let outcome = ApplyOutcome::NotAvailable.settle().await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::NotAvailable));
    }
}
