//! In-memory result cache with per-entry TTL, LRU eviction and
//! single-flight computation.
//!
//! Backed by [`moka`]: `try_get_with` coalesces concurrent misses for the
//! same key into one computation whose outcome every waiter receives.
//! Errors are handed to the waiters and never stored, so the next lookup
//! after a failure computes afresh.
//!
//! Entry lifetime depends on the result: code-example results live longer
//! than searches, and partial results get a short TTL so a recovered
//! adapter is picked up quickly.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{CacheKey, QueryKind, RankedResult};

/// Lifetimes applied to cached results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Complete search results.
    pub search: Duration,
    /// Complete code-example results.
    pub examples: Duration,
    /// Partial results of either kind, capped by the kind's lifetime.
    pub partial: Duration,
}

impl TtlPolicy {
    /// Lifetimes from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            search: Duration::from_secs(config.search_ttl_seconds),
            examples: Duration::from_secs(config.example_ttl_seconds),
            partial: Duration::from_secs(config.partial_ttl_seconds),
        }
    }

    /// Lifetime for `result`. Never zero.
    pub fn ttl_for(&self, result: &RankedResult) -> Duration {
        let base = match result.query.kind() {
            QueryKind::Search => self.search,
            QueryKind::CodeExample => self.examples,
        };
        let ttl = if result.partial {
            self.partial.min(base)
        } else {
            base
        };
        ttl.max(Duration::from_millis(1))
    }
}

/// A stored result together with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under.
    pub key: CacheKey,
    /// The full ranked result.
    pub value: RankedResult,
    /// When the entry was stored.
    pub created_at: Instant,
    /// When the entry stops being served. Always after `created_at`.
    pub expires_at: Instant,
    /// Rough heap footprint in bytes.
    pub size_hint: usize,
}

impl CacheEntry {
    fn new(key: CacheKey, value: RankedResult, ttl: Duration) -> Self {
        let created_at = Instant::now();
        let size_hint = value.size_hint();
        Self {
            key,
            value,
            created_at,
            expires_at: created_at + ttl,
            size_hint,
        }
    }

    fn ttl(&self) -> Duration {
        self.expires_at.duration_since(self.created_at)
    }
}

/// Per-entry expiry read from the entry itself.
struct EntryExpiry;

impl Expiry<CacheKey, Arc<CacheEntry>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Arc<CacheEntry>,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl())
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &Arc<CacheEntry>,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl())
    }
}

/// Counters describing cache use since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Stored entries. Approximate until pending maintenance has run, and
    /// expired entries can be counted for about a second after expiry.
    pub entries: u64,
    /// Calls to [`ResultCache::get_or_compute`].
    pub lookups: u64,
    /// Lookups answered without running a computation of their own.
    pub hits: u64,
    /// Computations started.
    pub computations: u64,
    /// Computations that failed and were not cached.
    pub failures: u64,
}

/// Keyed result store shared by all query paths.
pub struct ResultCache {
    inner: Cache<CacheKey, Arc<CacheEntry>>,
    ttl: TtlPolicy,
    lookups: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results.
    pub fn new(capacity: u64, ttl: TtlPolicy) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .eviction_listener(|key: Arc<CacheKey>, _entry, cause: RemovalCause| {
                tracing::trace!(key = %key, ?cause, "cache entry removed");
            })
            .build();
        Self {
            inner,
            ttl,
            lookups: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Create a cache from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cache_capacity, TtlPolicy::from_config(config))
    }

    /// Return the live result for `key`, or run `compute` exactly once
    /// across all concurrent callers for the same key.
    ///
    /// A successful computation is stored with a TTL from [`TtlPolicy`].
    ///
    /// # Errors
    ///
    /// Returns the computation's error to every waiting caller. Nothing is
    /// stored, so the next call computes again.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<RankedResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RankedResult>>,
    {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let init = async move {
            self.computations.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "cache miss, computing");
            let value = compute().await.inspect_err(|_| {
                self.failures.fetch_add(1, Ordering::Relaxed);
            })?;
            Ok::<_, EngineError>(Arc::new(self.entry(key.clone(), value)))
        };

        match self.inner.try_get_with(key.clone(), init).await {
            Ok(entry) => Ok(entry.value.clone()),
            Err(err) => Err(err.as_ref().clone()),
        }
    }

    /// The live result for `key`, if any.
    pub async fn get(&self, key: &CacheKey) -> Option<RankedResult> {
        self.inner.get(key).await.map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub async fn insert(&self, key: CacheKey, value: RankedResult) {
        let entry = Arc::new(self.entry(key.clone(), value));
        self.inner.insert(key, entry).await;
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Apply pending evictions and expirations now.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Usage counters.
    pub fn stats(&self) -> CacheStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let computations = self.computations.load(Ordering::Relaxed);
        CacheStats {
            entries: self.inner.entry_count(),
            lookups,
            hits: lookups.saturating_sub(computations),
            computations,
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Purge expired entries every `interval` until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.run_pending_tasks().await;
                tracing::trace!(entries = cache.inner.entry_count(), "cache sweep");
            }
        })
    }

    fn entry(&self, key: CacheKey, value: RankedResult) -> CacheEntry {
        let ttl = self.ttl.ttl_for(&value);
        CacheEntry::new(key, value, ttl)
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hit, Query, SearchHit};
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicUsize;

    fn query(term: &str, kind: QueryKind) -> Query {
        Query::new("python".into(), term.into(), kind, None, 5)
    }

    fn result(term: &str, kind: QueryKind, partial: bool) -> RankedResult {
        RankedResult {
            query: query(term, kind),
            hits: vec![Hit::Search(SearchHit {
                title: term.into(),
                snippet: String::new(),
                url: format!("https://docs.python.org/3/{term}"),
                source_adapter: "python-docs".into(),
                raw_score: 1.0,
            })],
            partial,
            contributing_adapters: BTreeSet::from(["python-docs".to_string()]),
            missing_adapters: BTreeSet::new(),
        }
    }

    fn ttl(ms: u64) -> TtlPolicy {
        TtlPolicy {
            search: Duration::from_millis(ms),
            examples: Duration::from_millis(ms * 2),
            partial: Duration::from_millis(ms / 4),
        }
    }

    #[test]
    fn ttl_depends_on_kind_and_partial() {
        let policy = ttl(1_000);
        assert_eq!(
            policy.ttl_for(&result("a", QueryKind::Search, false)),
            Duration::from_millis(1_000)
        );
        assert_eq!(
            policy.ttl_for(&result("a", QueryKind::CodeExample, false)),
            Duration::from_millis(2_000)
        );
        assert_eq!(
            policy.ttl_for(&result("a", QueryKind::Search, true)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn partial_ttl_never_exceeds_kind_ttl() {
        let policy = TtlPolicy {
            search: Duration::from_secs(10),
            examples: Duration::from_secs(10),
            partial: Duration::from_secs(60),
        };
        assert_eq!(
            policy.ttl_for(&result("a", QueryKind::Search, true)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn zero_ttl_clamped_so_entry_expires_after_creation() {
        let policy = TtlPolicy {
            search: Duration::ZERO,
            examples: Duration::ZERO,
            partial: Duration::ZERO,
        };
        let cache = ResultCache::new(10, policy);
        let entry = cache.entry(
            query("a", QueryKind::Search).cache_key(),
            result("a", QueryKind::Search, false),
        );
        assert!(entry.expires_at > entry.created_at);
    }

    #[tokio::test]
    async fn insert_then_get() {
        let cache = ResultCache::new(10, ttl(60_000));
        let key = query("asyncio", QueryKind::Search).cache_key();
        assert!(cache.get(&key).await.is_none());

        cache
            .insert(key.clone(), result("asyncio", QueryKind::Search, false))
            .await;
        let cached = cache.get(&key).await.expect("cached");
        assert_eq!(cached.hits.len(), 1);
    }

    #[tokio::test]
    async fn second_lookup_does_not_recompute() {
        let cache = ResultCache::new(10, ttl(60_000));
        let key = query("asyncio", QueryKind::Search).cache_key();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(result("asyncio", QueryKind::Search, false))
                })
                .await
                .expect("value");
            assert_eq!(value.hits.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.lookups, 3);
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.hits, 2);
    }

    #[tokio::test]
    async fn expired_entry_is_recomputed() {
        let cache = ResultCache::new(10, ttl(100));
        let key = query("asyncio", QueryKind::Search).cache_key();
        cache
            .insert(key.clone(), result("asyncio", QueryKind::Search, false))
            .await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn partial_result_expires_first() {
        let cache = ResultCache::new(10, ttl(2_000));
        let partial = query("partial", QueryKind::Search).cache_key();
        let complete = query("complete", QueryKind::Search).cache_key();
        cache
            .insert(partial.clone(), result("partial", QueryKind::Search, true))
            .await;
        cache
            .insert(complete.clone(), result("complete", QueryKind::Search, false))
            .await;

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(cache.get(&partial).await.is_none());
        assert!(cache.get(&complete).await.is_some());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = ResultCache::new(10, ttl(60_000));
        let key = query("asyncio", QueryKind::Search).cache_key();

        let err = cache
            .get_or_compute(&key, || async {
                Err(EngineError::NoResultsAvailable {
                    library: "python".into(),
                    reason: "all 1 adapters failed or timed out".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoResultsAvailable { .. }));
        assert!(cache.get(&key).await.is_none());

        let value = cache
            .get_or_compute(&key, || async {
                Ok(result("asyncio", QueryKind::Search, false))
            })
            .await
            .expect("recovered");
        assert_eq!(value.hits.len(), 1);
        assert_eq!(cache.stats().failures, 1);
        assert_eq!(cache.stats().computations, 2);
    }

    #[tokio::test]
    async fn least_recently_used_entry_evicted() {
        let cache = ResultCache::new(3, ttl(60_000));
        let key = |t: &str| query(t, QueryKind::Search).cache_key();

        for term in ["a", "b", "c"] {
            cache
                .insert(key(term), result(term, QueryKind::Search, false))
                .await;
            cache.run_pending_tasks().await;
        }
        assert!(cache.get(&key("a")).await.is_some());
        cache.run_pending_tasks().await;

        cache
            .insert(key("d"), result("d", QueryKind::Search, false))
            .await;
        cache.run_pending_tasks().await;

        assert!(cache.get(&key("b")).await.is_none());
        assert!(cache.get(&key("a")).await.is_some());
        assert!(cache.get(&key("c")).await.is_some());
        assert!(cache.get(&key("d")).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_coalesce() {
        let cache = Arc::new(ResultCache::new(10, ttl(60_000)));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query("asyncio", QueryKind::Search).cache_key();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let key = key.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_compute(&key, || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(result("asyncio", QueryKind::Search, false))
                        })
                        .await
                })
            })
            .collect();

        let results: Vec<RankedResult> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("task").expect("value"))
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn sweeper_purges_expired_entries() {
        let cache = Arc::new(ResultCache::new(10, ttl(50)));
        cache
            .insert(
                query("a", QueryKind::Search).cache_key(),
                result("a", QueryKind::Search, false),
            )
            .await;
        cache.run_pending_tasks().await;
        assert_eq!(cache.stats().entries, 1);

        let key = query("a", QueryKind::Search).cache_key();
        let sweeper = cache.spawn_sweeper(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get(&key).await.is_none());

        // Timer-wheel expiry has about one second of resolution.
        tokio::time::sleep(Duration::from_millis(2_300)).await;
        assert_eq!(cache.stats().entries, 0);
        sweeper.abort();
    }
}
