use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::app_state::SharedAppState;
use crate::store::EphemeralCache;

/// Run the cache purge on the configured interval until the stop flag is
/// raised.
pub async fn setup_cache_purge(
    app_state: SharedAppState,
) -> anyhow::Result<tokio::task::JoinHandle<anyhow::Result<()>>> {
    let stop_flag = app_state.stop_flag.clone();
    let mut scheduler = clokwerk::AsyncScheduler::new();

    {
        let cache = app_state.cache.clone();
        scheduler
            .every(app_state.settings.scheduler.cache_purge.into())
            .run(move || {
                let cache = cache.clone();
                async move {
                    purge_expired_entries(cache).await;
                }
            });
    }

    let handle = tokio::spawn({
        let stop_flag = stop_flag.clone();
        async move {
            while !stop_flag.is_stopped() {
                scheduler.run_pending().await;
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }

            Ok(())
        }
    });

    Ok(handle)
}

#[instrument(skip(cache))]
pub async fn purge_expired_entries(cache: Arc<dyn EphemeralCache>) -> usize {
    match cache.purge_expired().await {
        Ok(purged) => {
            debug!("Purged {} expired cache entries", purged);
            purged
        }
        Err(e) => {
            warn!("Failed to purge expired cache entries: {}", e);
            0
        }
    }
}
