// src/watch.rs
// =============================================================================
// The loop behind the 'watch' subcommand.
//
// Every tick reads through the cache; only a stale or missing entry causes
// links to be checked again. The shutdown signal is raced against both the
// wait for the next tick and the refresh itself. Dropping a refresh drops the
// in-flight checks with it, so an interrupt never waits for slow links.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::cache::{CacheEntry, ResultCache};
use crate::moodle::SourceError;

/// What one tick produced.
#[derive(Debug)]
pub enum Tick {
    Fresh(Arc<CacheEntry>),
    /// The refresh failed; `stale` is whatever the cache still holds
    Failed {
        error: SourceError,
        stale: Option<Arc<CacheEntry>>,
    },
}

pub async fn watch<S, F>(cache: &ResultCache, period: Duration, shutdown: S, mut on_tick: F) -> Result<()>
where
    S: Future<Output = ()>,
    F: FnMut(Tick) -> Result<()>,
{
    let mut ticker = tokio::time::interval(period);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("interrupted, stopping watch");
                return Ok(());
            }
        }

        let result = tokio::select! {
            result = cache.get_results(false) => result,
            _ = &mut shutdown => {
                tracing::info!("interrupted during refresh, abandoning in-flight checks");
                return Ok(());
            }
        };

        let tick = match result {
            Ok(entry) => Tick::Fresh(entry),
            Err(error) => {
                let last_updated = cache.last_update_time().await;
                tracing::warn!(error = %error, ?last_updated, "watch refresh failed");
                Tick::Failed {
                    error,
                    stale: cache.snapshot().await,
                }
            }
        };
        on_tick(tick)?;
    }
}
