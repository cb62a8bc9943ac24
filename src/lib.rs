//! App updater: lifecycle-aware coordination of application bundle updates.
//!
//! The coordinator decides *when* to ask an external update provider for a
//! new bundle, then fetches and applies it:
//! Lifecycle source → State tracker → Update orchestrator → Provider
//!
//! # Architecture
//!
//! - **Lifecycle**: foreground/background labels delivered over a tokio
//!   broadcast channel
//! - **State tracker**: debounces foreground returns against a refresh window
//! - **Orchestrator**: runs check → fetch → apply with a dev-sandbox
//!   short-circuit and a configurable error policy
//! - **Log**: append-only decision records, optionally mirrored to `tracing`

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod update;

pub use config::{UpdateHooks, UpdaterConfig};
pub use error::{ProviderError, Result, UpdaterError};
pub use lifecycle::{LifecycleChannel, LifecycleSource, ListenerHandle};
pub use update::{ApplyOutcome, UpdateCheck, UpdateCoordinator, UpdateProvider};
