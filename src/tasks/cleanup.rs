//! Expiry Cleanup Task
//!
//! Background task that periodically drops expired responses and elapsed
//! rate-limit windows. Profile lookups are left alone so expired profiles
//! stay available as upstream-failure fallbacks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CompressedCache;
use crate::limiter::FixedWindowLimiter;

/// Spawns a background task that purges expired state every interval.
///
/// Returns the task handle so shutdown can abort it.
pub fn spawn_cleanup_task(
    responses: Arc<RwLock<CompressedCache<String, Value>>>,
    dm_limits: Arc<Mutex<FixedWindowLimiter>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let responses_removed = responses.write().await.purge_expired();
            let windows_removed = dm_limits.lock().await.purge_elapsed();

            if responses_removed + windows_removed > 0 {
                info!(
                    responses_removed,
                    windows_removed, "Cleanup removed expired entries"
                );
            } else {
                debug!("Cleanup found nothing expired");
            }
        }
    })
}
