//! Configuration types for the update coordinator.

use crate::error::{Result, UpdaterError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default minimum spacing between lifecycle-triggered checks (seconds).
pub const DEFAULT_MIN_REFRESH_SECS: u64 = 300;

/// Coordinator settings. Immutable once a coordinator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Minimum elapsed time between two checks triggered by lifecycle transitions.
    pub min_refresh_secs: u64,
    /// Re-raise provider failures from the direct entry points instead of
    /// swallowing them.
    pub throw_on_error: bool,
    /// Await the fetch + apply phase instead of launching it detached.
    pub await_apply: bool,
    /// Mirror log records to the tracing console in non-release builds.
    pub debug_logging: bool,
    /// Development sandbox: never contact the provider.
    pub dev_sandbox: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            min_refresh_secs: DEFAULT_MIN_REFRESH_SECS,
            throw_on_error: false,
            await_apply: false,
            debug_logging: false,
            dev_sandbox: false,
        }
    }
}

impl UpdaterConfig {
    /// Parse configuration from a TOML string, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::Config`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| UpdaterError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// A zero-argument side-effecting callback invoked at a fixed phase boundary.
pub type UpdateHook = Arc<dyn Fn() + Send + Sync>;

/// Optional caller hooks around the check and download phases.
///
/// An empty slot is a no-op.
#[derive(Clone, Default)]
pub struct UpdateHooks {
    before_check: Option<UpdateHook>,
    before_download: Option<UpdateHook>,
    after_check: Option<UpdateHook>,
}

impl UpdateHooks {
    /// Hooks with every slot empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before a lifecycle-triggered check starts.
    pub fn with_before_check(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_check = Some(Arc::new(hook));
        self
    }

    /// Called right before the provider's fetch primitive.
    pub fn with_before_download(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_download = Some(Arc::new(hook));
        self
    }

    /// Called after a lifecycle-triggered check sequence returns.
    pub fn with_after_check(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_check = Some(Arc::new(hook));
        self
    }

    pub(crate) fn before_check(&self) {
        if let Some(hook) = &self.before_check {
            hook();
        }
    }

    pub(crate) fn before_download(&self) {
        if let Some(hook) = &self.before_download {
            hook();
        }
    }

    pub(crate) fn after_check(&self) {
        if let Some(hook) = &self.after_check {
            hook();
        }
    }
}

impl std::fmt::Debug for UpdateHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateHooks")
            .field("before_check", &self.before_check.is_some())
            .field("before_download", &self.before_download.is_some())
            .field("after_check", &self.after_check.is_some())
            .finish()
    }
}
