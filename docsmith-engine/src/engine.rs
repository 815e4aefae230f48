//! The engine entry point tying normaliser, cache, fan-out and ranker together.
//!
//! A query flows: normalise → cache lookup → (on miss) fan-out → rank →
//! store. Concurrent identical queries share one fan-out. Every caller gets
//! the cached list truncated to its own result count.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, ResultCache};
use crate::circuit_breaker::CircuitState;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::health::{AdapterHealthRecord, HealthMonitor, LibraryOutages, OverallStatus};
use crate::normalize::normalize;
use crate::orchestrator::fanout::Aggregator;
use crate::orchestrator::ranking::rank;
use crate::registry::AdapterRegistry;
use crate::types::{Query, RankedResult, RawQuery};

/// Circuit state of one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitReport {
    /// Adapter id.
    pub adapter_id: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

/// Everything the engine knows about its own health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Status over the trailing window.
    pub status: OverallStatus,
    /// Lifetime counters per adapter.
    pub adapters: BTreeMap<String, AdapterHealthRecord>,
    /// Circuit breaker state per adapter called so far.
    pub circuits: Vec<CircuitReport>,
    /// Per-library outage counters.
    pub outages: BTreeMap<String, LibraryOutages>,
    /// Cache usage.
    pub cache: CacheStats,
}

/// Documentation retrieval engine.
///
/// Construct one per process and share it; all methods take `&self`.
pub struct DocsEngine {
    registry: Arc<AdapterRegistry>,
    health: Arc<HealthMonitor>,
    aggregator: Aggregator,
    cache: Arc<ResultCache>,
    config: EngineConfig,
}

impl DocsEngine {
    /// Create an engine over `registry`, reporting to `health`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Config`] if `config` is invalid.
    pub fn new(
        registry: Arc<AdapterRegistry>,
        health: Arc<HealthMonitor>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let aggregator = Aggregator::from_config(&config, Arc::clone(&health));
        let cache = Arc::new(ResultCache::from_config(&config));
        tracing::info!(
            libraries = registry.libraries().len(),
            adapters = registry.adapter_ids().len(),
            "docs engine ready"
        );
        Ok(Self {
            registry,
            health,
            aggregator,
            cache,
            config,
        })
    }

    /// Answer `raw`, from cache when possible.
    ///
    /// # Errors
    ///
    /// - [`crate::EngineError::UnknownLibrary`] / [`crate::EngineError::InvalidQuery`]
    ///   from normalisation, before any adapter is called.
    /// - [`crate::EngineError::NoResultsAvailable`] when no adapter answered.
    pub async fn query(&self, raw: &RawQuery) -> Result<RankedResult> {
        let (query, key) = normalize(raw, &self.registry, &self.config)?;
        tracing::trace!(key = %key, "query");
        let result = self
            .cache
            .get_or_compute(&key, || self.compute(&query))
            .await?;
        Ok(result.for_query(&query))
    }

    /// Search `library`'s documentation for `term`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::query`].
    pub async fn search_docs(
        &self,
        library: &str,
        term: &str,
        max_results: Option<usize>,
    ) -> Result<RankedResult> {
        let mut raw = RawQuery::search(library, term);
        raw.max_results = max_results;
        self.query(&raw).await
    }

    /// Find code examples for `function` in `library`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::query`].
    pub async fn code_examples(
        &self,
        library: &str,
        function: &str,
        language: Option<&str>,
        max_examples: Option<usize>,
    ) -> Result<RankedResult> {
        let mut raw = RawQuery::code_example(library, function);
        raw.language = language.map(str::to_owned);
        raw.max_results = max_examples;
        self.query(&raw).await
    }

    /// Registered libraries, sorted.
    pub fn available_libraries(&self) -> Vec<String> {
        self.registry.libraries()
    }

    /// Adapter counters, overall status, circuits, outages and cache usage.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: self.health.overall_status(),
            adapters: self.health.snapshot(),
            circuits: self
                .aggregator
                .circuits()
                .into_iter()
                .map(|(adapter_id, state, consecutive_failures)| CircuitReport {
                    adapter_id,
                    state,
                    consecutive_failures,
                })
                .collect(),
            outages: self.health.outages(),
            cache: self.cache.stats(),
        }
    }

    /// Cache usage counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Start the periodic purge of expired cache entries.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.cache.spawn_sweeper(self.config.sweep_interval())
    }

    /// Apply pending cache evictions and expirations immediately.
    pub async fn run_cache_maintenance(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn compute(&self, query: &Query) -> Result<RankedResult> {
        let adapters = self
            .registry
            .relevant(query.library(), query.kind(), query.language())?;
        let collected = self.aggregator.run(query, &adapters).await?;
        let priorities = self.registry.priorities(query.library());
        let hits = rank(collected.hits, &priorities, self.config.max_results_limit);

        let partial = !collected.missing.is_empty();
        if partial {
            tracing::info!(
                library = query.library(),
                missing = ?collected.missing,
                "serving partial result"
            );
        }
        Ok(RankedResult {
            query: query.clone(),
            hits,
            partial,
            contributing_adapters: collected.contributing,
            missing_adapters: collected.missing,
        })
    }
}

impl std::fmt::Debug for DocsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocsEngine")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish()
    }
}
