// src/cache.rs
// =============================================================================
// Keeps the most recent validation run in memory for a limited time.
//
// - get_results(false) serves the stored entry while it is younger than the
//   TTL, and runs a full fetch -> validate cycle otherwise
// - get_results(true) always runs a new cycle
// - a failed cycle leaves the stored entry alone and only the caller that
//   triggered it sees the error
//
// The entry is an Arc<CacheEntry> swapped in whole under a write lock, so a
// reader gets either the old entry or the new one, never a mix of results
// from one run and the timestamp of another. Two callers that both decide to
// refresh each run their own cycle; the last one to store wins.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::checker::ValidationRecord;
use crate::moodle::{LinkSource, SourceError};
use crate::validate::Validator;

/// One complete validation run.
#[derive(Debug)]
pub struct CacheEntry {
    pub results: Vec<ValidationRecord>,
    pub last_updated: DateTime<Utc>,
    // Monotonic clock for TTL checks; wall-clock jumps don't expire entries
    stored_at: Instant,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    pub fn broken(&self) -> impl Iterator<Item = &ValidationRecord> {
        self.results.iter().filter(|record| !record.valid)
    }
}

pub struct ResultCache {
    source: Arc<dyn LinkSource>,
    validator: Validator,
    ttl: Duration,
    entry: RwLock<Option<Arc<CacheEntry>>>,
}

impl ResultCache {
    pub fn new(source: Arc<dyn LinkSource>, validator: Validator, ttl: Duration) -> Self {
        tracing::info!(ttl_secs = ttl.as_secs(), "link cache initialized");
        Self {
            source,
            validator,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Returns the cached run if it is still fresh, otherwise runs a new one.
    ///
    /// `force_refresh` skips the freshness check.
    pub async fn get_results(&self, force_refresh: bool) -> Result<Arc<CacheEntry>, SourceError> {
        if !force_refresh {
            if let Some(entry) = self.fresh_entry().await {
                tracing::debug!(age_secs = entry.age().as_secs(), "serving cached results");
                return Ok(entry);
            }
        }
        self.refresh().await
    }

    /// When the stored run finished, or None before the first successful run.
    pub async fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.entry.read().await.as_ref().map(|entry| entry.last_updated)
    }

    /// The stored run regardless of age, for showing stale data after a
    /// failed refresh.
    pub async fn snapshot(&self) -> Option<Arc<CacheEntry>> {
        self.entry.read().await.clone()
    }

    async fn fresh_entry(&self) -> Option<Arc<CacheEntry>> {
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|entry| entry.age() < self.ttl)
            .cloned()
    }

    async fn refresh(&self) -> Result<Arc<CacheEntry>, SourceError> {
        tracing::info!("fetching fresh link validation results");

        let links = self.source.fetch_links().await.inspect_err(|e| {
            tracing::warn!(error = %e, "refresh failed, keeping previous results");
        })?;
        let results = self.validator.validate(links).await;

        let mut slot = self.entry.write().await;
        let entry = Arc::new(CacheEntry {
            results,
            last_updated: next_timestamp(slot.as_ref().map(|previous| previous.last_updated)),
            stored_at: Instant::now(),
        });
        *slot = Some(entry.clone());

        tracing::info!(links = entry.results.len(), "cache updated");
        Ok(entry)
    }
}

// Wall-clock time, nudged forward if the clock did not move past the
// previous store
fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if now <= previous => previous + chrono::Duration::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{DiscoveredLink, LinkOutcome, LinkProbe, OriginContext};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

    // Returns a fixed link list, or an error while `failing` is set
    struct ScriptedSource {
        links: Vec<DiscoveredLink>,
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl LinkSource for ScriptedSource {
        async fn fetch_links(&self) -> Result<Vec<DiscoveredLink>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(SourceError::Status {
                    function: "core_course_get_courses".into(),
                    status: 503,
                });
            }
            Ok(self.links.clone())
        }
    }

    // Answers every link with whatever status code is currently set
    struct StatusProbe {
        code: AtomicU16,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LinkProbe for StatusProbe {
        async fn check(&self, link: DiscoveredLink) -> ValidationRecord {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let code = self.code.load(Ordering::SeqCst);
            let outcome = if (200..300).contains(&code) {
                LinkOutcome::Ok { code }
            } else {
                LinkOutcome::HttpStatus { code }
            };
            ValidationRecord::new(link, outcome)
        }
    }

    struct Fixture {
        source: Arc<ScriptedSource>,
        probe: Arc<StatusProbe>,
        cache: ResultCache,
    }

    fn fixture(ttl: Duration) -> Fixture {
        let source = Arc::new(ScriptedSource {
            links: vec![
                DiscoveredLink::new("https://example.com", OriginContext::new("Course1", "Task1")),
                DiscoveredLink::new("https://example.org", OriginContext::new("Course1", "Task2")),
            ],
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        });
        let probe = Arc::new(StatusProbe {
            code: AtomicU16::new(200),
            calls: AtomicUsize::new(0),
        });
        let validator = Validator::new(probe.clone(), 4);
        let cache = ResultCache::new(source.clone(), validator, ttl);
        Fixture { source, probe, cache }
    }

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn test_second_read_within_ttl_is_served_from_cache() {
        let f = fixture(DAY);

        let first = f.cache.get_results(false).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert_eq!(f.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), 2);

        let second = f.cache.get_results(false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_runs_exactly_one_cycle() {
        let f = fixture(DAY);
        f.cache.get_results(true).await.unwrap();

        f.probe.code.store(404, Ordering::SeqCst);
        let refreshed = f.cache.get_results(true).await.unwrap();

        assert_eq!(f.source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), 4);
        assert!(refreshed.results.iter().all(|r| !r.valid));
        assert!(refreshed.results.iter().all(|r| r.status_message == "Page Not Found"));
        assert_eq!(refreshed.broken().count(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_results() {
        let f = fixture(DAY);
        let before = f.cache.get_results(false).await.unwrap();
        let stamp = f.cache.last_update_time().await;

        f.source.failing.store(true, Ordering::SeqCst);
        let err = f.cache.get_results(true).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));

        let after = f.cache.get_results(false).await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(f.cache.last_update_time().await, stamp);
        // the failed cycle never reached the checker
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_before_first_success_leaves_cache_empty() {
        let f = fixture(DAY);
        f.source.failing.store(true, Ordering::SeqCst);

        assert!(f.cache.get_results(false).await.is_err());
        assert!(f.cache.last_update_time().await.is_none());
        assert!(f.cache.snapshot().await.is_none());

        f.source.failing.store(false, Ordering::SeqCst);
        assert_eq!(f.cache.get_results(false).await.unwrap().results.len(), 2);
    }

    #[tokio::test]
    async fn test_last_update_time() {
        let f = fixture(DAY);
        assert!(f.cache.last_update_time().await.is_none());

        let started = Utc::now();
        f.cache.get_results(true).await.unwrap();
        let first = f.cache.last_update_time().await.unwrap();
        assert!(first >= started);
        assert!(first <= Utc::now());

        f.cache.get_results(true).await.unwrap();
        let second = f.cache.last_update_time().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refreshed() {
        let f = fixture(Duration::ZERO);
        f.cache.get_results(false).await.unwrap();
        f.cache.get_results(false).await.unwrap();
        assert_eq!(f.source.calls.load(Ordering::SeqCst), 2);

        // stale data stays visible to presentation code
        assert!(f.cache.snapshot().await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_readers_share_one_entry() {
        let f = Arc::new(fixture(DAY));
        let populated = f.cache.get_results(false).await.unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let f = f.clone();
                tokio::spawn(async move { f.cache.get_results(false).await.unwrap() })
            })
            .collect();
        for reader in readers {
            let entry = reader.await.unwrap();
            assert!(Arc::ptr_eq(&populated, &entry));
        }
        assert_eq!(f.source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let future = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(next_timestamp(Some(future)), future + chrono::Duration::microseconds(1));

        let past = Utc::now() - chrono::Duration::seconds(60);
        assert!(next_timestamp(Some(past)) > past);
        assert!(next_timestamp(None) <= Utc::now());
    }
}
