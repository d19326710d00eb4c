//! Periodic purge of rooms past their expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sketchroom_core::RoomRegistry;
use tokio::task::JoinHandle;

/// Spawn the purge loop. Runs until the returned handle is aborted.
pub fn spawn_expiry_sweep(registry: Arc<RoomRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(period_secs = period.as_secs(), "Room expiry sweep started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match registry.purge_expired(Utc::now()).await {
                Ok(0) => tracing::debug!("No expired rooms"),
                Ok(purged) => tracing::info!(purged, "Purged expired rooms"),
                Err(e) => tracing::error!(error = %e, "Room expiry sweep failed"),
            }
        }
    })
}
