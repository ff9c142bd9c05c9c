//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries,
//! independent of reads.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// The returned handle is the stop switch: abort it on shutdown.
///
/// # Example
/// ```ignore
/// let sweep = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep.abort();
/// ```
pub fn spawn_sweep_task(cache: SharedCache, interval: Duration) -> JoinHandle<()> {
    let lock = cache.inner();

    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = lock.write().await.cleanup_expired();

            if removed > 0 {
                info!(removed, "Expiry sweep removed entries");
            } else {
                debug!("Expiry sweep: nothing expired");
            }
        }
    })
}
