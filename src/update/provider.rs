//! Update provider contract.
//!
//! The provider owns the actual bundle delivery: asking whether a newer
//! bundle exists, downloading it, and activating it. The coordinator only
//! sequences these three calls.

use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Result of the provider's availability check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCheck {
    pub is_available: bool,
}

/// Native update primitives.
#[async_trait]
pub trait UpdateProvider: Send + Sync {
    /// Ask whether a newer bundle exists.
    async fn check_for_update(&self) -> Result<UpdateCheck, ProviderError>;

    /// Download the new bundle without activating it.
    async fn fetch_update(&self) -> Result<(), ProviderError>;

    /// Activate the fetched bundle. On success this normally restarts the
    /// process and does not return.
    async fn apply_update(&self) -> Result<(), ProviderError>;
}

/// Provider call names recorded by [`ScriptedProvider`].
pub const CALL_CHECK: &str = "provider.check";
pub const CALL_FETCH: &str = "provider.fetch";
pub const CALL_APPLY: &str = "provider.apply";

#[derive(Debug, Default)]
struct Script {
    available: bool,
    check_error: Option<String>,
    fetch_error: Option<String>,
    apply_error: Option<String>,
}

/// In-memory provider with scripted answers.
///
/// Each call is appended to a shared journal so callers can assert call
/// order, including relative to their own hook entries.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ScriptedProvider {
    /// Provider that reports `available` and succeeds on every call.
    pub fn new(available: bool) -> Self {
        Self::with_journal(available, Arc::new(Mutex::new(Vec::new())))
    }

    /// Like [`new`](Self::new) but recording into an existing journal.
    pub fn with_journal(available: bool, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                available,
                ..Default::default()
            })),
            journal,
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn note(&self, call: &str) {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.to_owned());
    }

    pub fn set_available(&self, available: bool) {
        self.script().available = available;
    }

    /// Make the check primitive fail with `message` (`None` clears it).
    pub fn fail_check(&self, message: Option<&str>) {
        self.script().check_error = message.map(str::to_owned);
    }

    /// Make the fetch primitive fail with `message` (`None` clears it).
    pub fn fail_fetch(&self, message: Option<&str>) {
        self.script().fetch_error = message.map(str::to_owned);
    }

    /// Make the apply primitive fail with `message` (`None` clears it).
    pub fn fail_apply(&self, message: Option<&str>) {
        self.script().apply_error = message.map(str::to_owned);
    }

    /// Shared call journal.
    pub fn journal(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.journal)
    }

    /// Snapshot of the journal.
    pub fn calls(&self) -> Vec<String> {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of journal entries equal to `call`.
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

#[async_trait]
impl UpdateProvider for ScriptedProvider {
    async fn check_for_update(&self) -> Result<UpdateCheck, ProviderError> {
        self.note(CALL_CHECK);
        let script = self.script();
        match &script.check_error {
            Some(msg) => Err(ProviderError::Check(msg.clone())),
            None => Ok(UpdateCheck {
                is_available: script.available,
            }),
        }
    }

    async fn fetch_update(&self) -> Result<(), ProviderError> {
        self.note(CALL_FETCH);
        match &self.script().fetch_error {
            Some(msg) => Err(ProviderError::Fetch(msg.clone())),
            None => Ok(()),
        }
    }

    async fn apply_update(&self) -> Result<(), ProviderError> {
        self.note(CALL_APPLY);
        match &self.script().apply_error {
            Some(msg) => Err(ProviderError::Apply(msg.clone())),
            None => Ok(()),
        }
    }
}
