// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::engine::DetectionEngine;

/// Spawn the periodic trigger. The first tick fires immediately, mirroring a
/// run-at-startup job; after that it is one trigger per interval. Overlap is
/// handled by the engine's guard, not here.
pub fn spawn(engine: Arc<DetectionEngine>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            tracing::debug!("scheduler tick");
            engine.try_run().await;
        }
    })
}
