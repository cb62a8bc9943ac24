//! Update-check coordination.
//!
//! Decides when to ask an [`UpdateProvider`] for a new application bundle,
//! in response to lifecycle transitions or direct calls, and sequences the
//! check → fetch → apply phases under the configured error policy.

pub mod coordinator;
pub mod log;
pub mod orchestrator;
pub mod provider;
pub mod state;
pub mod tracker;

pub use coordinator::{CoordinatorBuilder, UpdateCoordinator};
pub use log::UpdateLog;
pub use orchestrator::{ApplyOutcome, UpdateOrchestrator};
pub use provider::{ScriptedProvider, UpdateCheck, UpdateProvider};
pub use state::{Clock, CoordinatorState, ManualClock, StateSnapshot, SystemClock};
pub use tracker::{StateTracker, TransitionDecision};
