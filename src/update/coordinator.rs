//! Public update coordinator.
//!
//! Ties the [`StateTracker`] and [`UpdateOrchestrator`] of one instance to a
//! lifecycle source and exposes the direct entry points.
//!
//! # Usage
//!
//! ```rust,ignore
//! let coordinator = UpdateCoordinator::builder(provider, lifecycle)
//!     .with_config(UpdaterConfig::default())
//!     .with_hooks(UpdateHooks::new().with_before_download(show_spinner))
//!     .build();
//! coordinator.force_apply_update().await?;
//! coordinator.register_lifecycle_listener()?;
//! ```

use crate::config::{UpdateHooks, UpdaterConfig};
use crate::error::{Result, UpdaterError};
use crate::lifecycle::{LifecycleSource, ListenerHandle};
use crate::update::log::UpdateLog;
use crate::update::orchestrator::{ApplyOutcome, UpdateOrchestrator};
use crate::update::provider::{UpdateCheck, UpdateProvider};
use crate::update::state::{Clock, CoordinatorState, SharedState, StateSnapshot, SystemClock};
use crate::update::tracker::{StateTracker, TransitionDecision};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Builder for [`UpdateCoordinator`].
pub struct CoordinatorBuilder {
    provider: Arc<dyn UpdateProvider>,
    lifecycle: Arc<dyn LifecycleSource>,
    config: UpdaterConfig,
    hooks: UpdateHooks,
    clock: Arc<dyn Clock>,
}

impl CoordinatorBuilder {
    /// Replace the default [`UpdaterConfig`].
    pub fn with_config(mut self, config: UpdaterConfig) -> Self {
        self.config = config;
        self
    }

    /// Install caller hooks around the check and download phases.
    pub fn with_hooks(mut self, hooks: UpdateHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Override the time source (defaults to [`SystemClock`]).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the coordinator, reading the lifecycle source's current state.
    pub fn build(self) -> UpdateCoordinator {
        let state = SharedState::new(CoordinatorState::new(self.lifecycle.current_state()));
        let log = UpdateLog::new(self.config.debug_logging);
        let orchestrator = UpdateOrchestrator::new(
            self.config,
            self.provider,
            self.hooks,
            self.clock,
            state,
            log,
        );
        UpdateCoordinator {
            tracker: StateTracker::new(orchestrator),
            lifecycle: self.lifecycle,
            listener: Mutex::new(None),
        }
    }
}

/// Decides when to check for, fetch and apply application updates.
pub struct UpdateCoordinator {
    tracker: StateTracker,
    lifecycle: Arc<dyn LifecycleSource>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl UpdateCoordinator {
    /// Start building a coordinator over `provider` and `lifecycle`.
    pub fn builder(
        provider: Arc<dyn UpdateProvider>,
        lifecycle: Arc<dyn LifecycleSource>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            provider,
            lifecycle,
            config: UpdaterConfig::default(),
            hooks: UpdateHooks::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Coordinator with `config`, no hooks and the system clock.
    pub fn new(
        config: UpdaterConfig,
        provider: Arc<dyn UpdateProvider>,
        lifecycle: Arc<dyn LifecycleSource>,
    ) -> Self {
        Self::builder(provider, lifecycle).with_config(config).build()
    }

    fn orchestrator(&self) -> &UpdateOrchestrator {
        self.tracker.orchestrator()
    }

    fn listener_slot(&self) -> std::sync::MutexGuard<'_, Option<ListenerHandle>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to the lifecycle source. A previous listener is released
    /// and replaced.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::Listener`] when called outside a tokio runtime.
    pub fn register_lifecycle_listener(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| UpdaterError::Listener(format!("no tokio runtime: {e}")))?;

        let handle = self
            .tracker
            .spawn_listener(&runtime, self.lifecycle.subscribe());
        // Dropping the old handle releases it.
        let _previous = self.listener_slot().replace(handle);

        self.orchestrator()
            .log()
            .record("lifecycle listener registered");
        info!("update lifecycle listener registered");
        Ok(())
    }

    /// Stop lifecycle delivery. Calling it again, or without a registered
    /// listener, does nothing.
    pub fn remove_lifecycle_listener(&self) {
        let Some(mut handle) = self.listener_slot().take() else {
            return;
        };
        handle.release();
        self.orchestrator().log().record("lifecycle listener removed");
        info!("update lifecycle listener removed");
    }

    /// Whether a lifecycle listener is currently registered.
    pub fn is_listening(&self) -> bool {
        self.listener_slot()
            .as_ref()
            .is_some_and(|h| !h.is_released())
    }

    /// Feed one lifecycle transition directly and await any check it
    /// triggers.
    pub async fn on_lifecycle_transition(&self, next_state: &str) -> TransitionDecision {
        self.tracker.on_lifecycle_transition(next_state).await
    }

    /// See [`UpdateOrchestrator::check_for_update`].
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::CheckFailed`] if the provider fails and
    /// `throw_on_error` is set.
    pub async fn check_for_update(&self) -> Result<UpdateCheck> {
        self.orchestrator().check_for_update().await
    }

    /// See [`UpdateOrchestrator::apply_update_if_available`].
    ///
    /// # Errors
    ///
    /// Propagates check, fetch and apply failures when `throw_on_error` is set.
    pub async fn apply_update_if_available(&self, force: bool) -> Result<ApplyOutcome> {
        self.orchestrator().apply_update_if_available(force).await
    }

    /// Check, then fetch and apply regardless of reported availability.
    ///
    /// # Errors
    ///
    /// Propagates check, fetch and apply failures when `throw_on_error` is set.
    pub async fn force_apply_update(&self) -> Result<ApplyOutcome> {
        self.orchestrator().force_apply_update().await
    }

    /// The configuration this coordinator was built with.
    pub fn config(&self) -> &UpdaterConfig {
        self.orchestrator().config()
    }

    /// Snapshot of every log record in emission order.
    pub fn log_records(&self) -> Vec<String> {
        self.orchestrator().log().records()
    }

    /// Last observed lifecycle label.
    pub fn lifecycle_state(&self) -> String {
        self.orchestrator().state().lock().lifecycle_state.clone()
    }

    /// Unix seconds of the last check; 0 if never checked.
    pub fn last_check_epoch(&self) -> u64 {
        self.orchestrator().state().lock().last_check_epoch
    }

    /// Serializable view of state and log records for diagnostics.
    pub fn snapshot(&self) -> StateSnapshot {
        let (last_check_epoch, lifecycle_state) = {
            let state = self.orchestrator().state().lock();
            (state.last_check_epoch, state.lifecycle_state.clone())
        };
        StateSnapshot {
            last_check_epoch,
            lifecycle_state,
            log_records: self.log_records(),
        }
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("config", self.config())
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}
