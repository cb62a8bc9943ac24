//! Replays a scripted lifecycle timeline against an update coordinator.
//!
//! Usage: `update-sim [config.toml]`
//!
//! The provider always reports an available update and never restarts the
//! process, so every triggered check runs the full fetch + apply sequence.
//! The final coordinator snapshot is printed to stdout as JSON; tracing
//! output goes to stderr.

use app_updater::lifecycle::{ACTIVE, BACKGROUND, LifecycleChannel};
use app_updater::update::{ManualClock, ScriptedProvider, TransitionDecision};
use app_updater::{UpdateCoordinator, UpdateHooks, UpdaterConfig};
use std::sync::Arc;

/// Seconds at which the app returns to the foreground.
const TIMELINE: [u64; 4] = [10, 310, 400, 620];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => UpdaterConfig::from_file(std::path::Path::new(&path))
            .map_err(|e| anyhow::anyhow!("cannot load config {path}: {e}"))?,
        None => UpdaterConfig {
            await_apply: true,
            debug_logging: true,
            ..Default::default()
        },
    };
    tracing::info!(?config, "update-sim starting");

    let clock = ManualClock::new(0);
    let provider = ScriptedProvider::new(true);
    let lifecycle = LifecycleChannel::with_current(ACTIVE);
    let hooks = UpdateHooks::new()
        .with_before_check(|| tracing::info!("hook: before check"))
        .with_before_download(|| tracing::info!("hook: before download"))
        .with_after_check(|| tracing::info!("hook: after check"));

    let coordinator = UpdateCoordinator::builder(Arc::new(provider.clone()), Arc::new(lifecycle))
        .with_config(config)
        .with_hooks(hooks)
        .with_clock(Arc::new(clock.clone()))
        .build();

    for at in TIMELINE {
        clock.set(at);
        coordinator.on_lifecycle_transition(BACKGROUND).await;
        let decision = coordinator.on_lifecycle_transition(ACTIVE).await;
        tracing::info!(at, ?decision, "foreground return");
        if decision == TransitionDecision::Check {
            tracing::info!(calls = ?provider.calls(), "provider calls so far");
        }
    }

    let snapshot = coordinator.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
