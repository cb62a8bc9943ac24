//! Error types for the update coordinator.

/// Top-level error type raised by the coordinator's direct entry points.
///
/// Provider failures only surface as [`CheckFailed`](UpdaterError::CheckFailed)
/// or [`ApplyFailed`](UpdaterError::ApplyFailed) when `throw_on_error` is set;
/// otherwise they are converted into log records.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// The provider's check primitive failed.
    #[error("update check failed: {0}")]
    CheckFailed(String),

    /// The provider's fetch or apply primitive failed.
    #[error("update apply failed: {0}")]
    ApplyFailed(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Lifecycle listener task error.
    #[error("listener error: {0}")]
    Listener(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Failure reported by an [`UpdateProvider`](crate::update::UpdateProvider).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Checking for a new bundle failed.
    #[error("check error: {0}")]
    Check(String),

    /// Downloading the new bundle failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Activating the downloaded bundle failed.
    #[error("apply error: {0}")]
    Apply(String),
}

impl ProviderError {
    /// The underlying provider message, without the phase prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Check(msg) | Self::Fetch(msg) | Self::Apply(msg) => msg,
        }
    }
}

impl From<ProviderError> for UpdaterError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Check(msg) => Self::CheckFailed(msg),
            ProviderError::Fetch(msg) | ProviderError::Apply(msg) => Self::ApplyFailed(msg),
        }
    }
}
