//! Concurrent fan-out of one query to every relevant adapter.
//!
//! Each adapter call runs as its own task under a per-adapter deadline.
//! A late adapter is aborted and recorded as timed out; its results are
//! discarded even if they would arrive later. Failures never cancel the
//! other adapters. The query fails only when nothing contributed.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::adapter::invoke;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::EngineConfig;
use crate::error::{AdapterError, EngineError, Result};
use crate::health::{AdapterOutcome, HealthMonitor, OutageCause};
use crate::registry::RegisteredAdapter;
use crate::types::{Hit, Query};

/// Hits gathered from one fan-out, before ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    /// Hits in emission order: adapters in registry priority order, each
    /// adapter's hits in the order it returned them.
    pub hits: Vec<Hit>,
    /// Adapters that answered in time, including with zero hits.
    pub contributing: BTreeSet<String>,
    /// Adapters that failed, timed out, or were skipped by their circuit.
    pub missing: BTreeSet<String>,
}

/// Runs queries against adapters and reports every attempt to health.
pub struct Aggregator {
    timeout: Duration,
    health: Arc<HealthMonitor>,
    breaker: Mutex<CircuitBreaker>,
}

impl Aggregator {
    /// Create an aggregator with a per-adapter `timeout`.
    pub fn new(
        timeout: Duration,
        health: Arc<HealthMonitor>,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            timeout,
            health,
            breaker: Mutex::new(CircuitBreaker::new(breaker)),
        }
    }

    /// Create an aggregator from engine configuration.
    pub fn from_config(config: &EngineConfig, health: Arc<HealthMonitor>) -> Self {
        Self::new(
            config.adapter_timeout(),
            health,
            config.circuit_breaker.clone(),
        )
    }

    /// `(adapter, state, consecutive_failures)` for every adapter called so far.
    pub fn circuits(&self) -> Vec<(String, CircuitState, u32)> {
        self.breaker().health_report()
    }

    /// Fan `query` out to `adapters` and collect what arrives in time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoResultsAvailable`] when `adapters` is empty
    /// or when no adapter answered in time.
    pub async fn run(&self, query: &Query, adapters: &[RegisteredAdapter]) -> Result<Collected> {
        if adapters.is_empty() {
            tracing::warn!(
                library = query.library(),
                kind = %query.kind(),
                "no adapter can serve query"
            );
            self.health
                .record_outage(query.library(), OutageCause::NoAdapters);
            return Err(EngineError::NoResultsAvailable {
                library: query.library().to_owned(),
                reason: format!("no adapter serves {} queries", query.kind()),
            });
        }

        let mut collected = Collected::default();
        let attempted: Vec<&RegisteredAdapter> = {
            let mut breaker = self.breaker();
            adapters
                .iter()
                .filter(|registered| {
                    let allowed = breaker.should_attempt(registered.id());
                    if !allowed {
                        tracing::debug!(adapter = registered.id(), "circuit open or probing, skipping adapter");
                        collected.missing.insert(registered.id().to_owned());
                    }
                    allowed
                })
                .collect()
        };

        let calls = attempted.iter().map(|registered| self.call(registered, query));
        let outcomes = futures::future::join_all(calls).await;

        for (registered, (outcome, latency)) in attempted.into_iter().zip(outcomes) {
            let id = registered.id();
            match outcome {
                Ok(hits) => {
                    tracing::debug!(
                        adapter = id,
                        count = hits.len(),
                        latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        "adapter returned hits"
                    );
                    self.health.record(id, &AdapterOutcome::Success, latency);
                    self.breaker().record_success(id);
                    collected.contributing.insert(id.to_owned());
                    collected
                        .hits
                        .extend(hits.into_iter().map(|hit| attribute(hit, id)));
                }
                Err(err) => {
                    tracing::warn!(adapter = id, error = %err, "adapter query failed");
                    let health_outcome = match err {
                        AdapterError::Timeout(_) => AdapterOutcome::Timeout,
                        other => AdapterOutcome::Failure {
                            error: other.to_string(),
                        },
                    };
                    self.health.record(id, &health_outcome, latency);
                    self.breaker().record_failure(id);
                    collected.missing.insert(id.to_owned());
                }
            }
        }

        if collected.contributing.is_empty() {
            tracing::warn!(
                library = query.library(),
                adapters = adapters.len(),
                "every adapter failed"
            );
            self.health
                .record_outage(query.library(), OutageCause::AllAdaptersFailed);
            return Err(EngineError::NoResultsAvailable {
                library: query.library().to_owned(),
                reason: format!("all {} adapters failed or timed out", adapters.len()),
            });
        }

        Ok(collected)
    }

    /// Invoke one adapter on its own task, bounded by the deadline.
    async fn call(
        &self,
        registered: &RegisteredAdapter,
        query: &Query,
    ) -> (std::result::Result<Vec<Hit>, AdapterError>, Duration) {
        let adapter = Arc::clone(registered.adapter());
        let owned = query.clone();
        let started = Instant::now();
        let mut handle = tokio::spawn(async move { invoke(adapter.as_ref(), &owned).await });

        let outcome = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AdapterError::Failed(format!(
                "adapter task aborted: {join_err}"
            ))),
            Err(_) => {
                handle.abort();
                Err(AdapterError::Timeout(self.timeout))
            }
        };
        (outcome, started.elapsed())
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hits are attributed to the adapter that returned them.
fn attribute(mut hit: Hit, adapter_id: &str) -> Hit {
    match &mut hit {
        Hit::Search(search) => adapter_id.clone_into(&mut search.source_adapter),
        Hit::Example(example) => adapter_id.clone_into(&mut example.source_adapter),
    }
    hit
}
