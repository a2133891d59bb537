use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::AppointmentRecord;

#[derive(Debug, Clone)]
pub struct CachedScrape {
    pub records: Vec<AppointmentRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// Single-entry scrape cache with a time-to-live.
///
/// The lock is held for the whole refresh, so concurrent callers wait for the
/// in-flight scrape instead of starting their own. Empty scrapes are returned but
/// not kept, so the next call tries again.
pub struct ScrapeCache {
    ttl: Duration,
    entry: Mutex<Option<CachedScrape>>,
}

impl ScrapeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub async fn get_or_refresh<F, Fut>(&self, now: DateTime<Utc>, refresh: F) -> CachedScrape
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<AppointmentRecord>>,
    {
        let mut entry = self.entry.lock().await;
        if let Some(cached) = entry.as_ref() {
            let age = now - cached.fetched_at;
            if age < self.ttl {
                debug!(age_secs = age.num_seconds(), "Cache hit for appointment page");
                return cached.clone();
            }
        }
        Self::store(&mut entry, now, refresh().await)
    }

    /// Refreshes regardless of age.
    pub async fn refresh<F, Fut>(&self, now: DateTime<Utc>, refresh: F) -> CachedScrape
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<AppointmentRecord>>,
    {
        let mut entry = self.entry.lock().await;
        Self::store(&mut entry, now, refresh().await)
    }

    fn store(entry: &mut Option<CachedScrape>, now: DateTime<Utc>, records: Vec<AppointmentRecord>) -> CachedScrape {
        let fresh = CachedScrape {
            records,
            fetched_at: now,
        };
        *entry = if fresh.records.is_empty() {
            None
        } else {
            Some(fresh.clone())
        };
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NextAvailable;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn one() -> Vec<AppointmentRecord> {
        vec![AppointmentRecord::new("Bayonne", NextAvailable::Unknown, None)]
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn serves_cached_within_ttl() {
        let cache = ScrapeCache::new(Duration::minutes(10));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let scrape = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            one()
        };

        cache.get_or_refresh(t0(), scrape).await;
        let hit = cache.get_or_refresh(t0() + Duration::minutes(9), scrape).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hit.fetched_at, t0());

        let miss = cache.get_or_refresh(t0() + Duration::minutes(10), scrape).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(miss.fetched_at, t0() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn empty_scrape_is_not_kept() {
        let cache = ScrapeCache::new(Duration::minutes(10));
        let first = cache.get_or_refresh(t0(), || async { Vec::new() }).await;
        assert!(first.records.is_empty());

        let second = cache.get_or_refresh(t0(), || async { one() }).await;
        assert_eq!(second.records.len(), 1);
    }

    #[tokio::test]
    async fn forced_refresh_ignores_age() {
        let cache = ScrapeCache::new(Duration::minutes(10));
        cache.get_or_refresh(t0(), || async { one() }).await;
        let forced = cache
            .refresh(t0() + Duration::seconds(1), || async { Vec::new() })
            .await;
        assert!(forced.records.is_empty());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let cache = Arc::new(ScrapeCache::new(Duration::minutes(10)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(t0(), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        one()
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().records.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
