//! Engine configuration with sensible defaults.
//!
//! [`EngineConfig`] controls result limits, the per-adapter deadline, cache
//! lifetimes and capacity, and the health thresholds. It deserialises with
//! per-field defaults so a host can embed it in its own config file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::EngineError;
use crate::types::QueryKind;

/// Configuration for a [`crate::DocsEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Result count for searches that do not ask for one.
    pub default_max_results: usize,
    /// Result count for code-example lookups that do not ask for one.
    pub default_max_examples: usize,
    /// Upper bound every requested count is clamped to.
    pub max_results_limit: usize,
    /// Per-adapter deadline in milliseconds.
    pub adapter_timeout_ms: u64,
    /// Lifetime of complete search results.
    pub search_ttl_seconds: u64,
    /// Lifetime of complete code-example results.
    pub example_ttl_seconds: u64,
    /// Lifetime of partial results of either kind (capped by the kind's TTL).
    pub partial_ttl_seconds: u64,
    /// Maximum number of cached results.
    pub cache_capacity: u64,
    /// How often the background sweeper purges expired entries.
    pub sweep_interval_seconds: u64,
    /// Trailing window for the overall health status.
    pub health_window_seconds: u64,
    /// Failure rate at or above which the engine reports `Degraded`.
    pub degraded_failure_rate: f64,
    /// Failure rate at or above which the engine reports `Unhealthy`.
    pub unhealthy_failure_rate: f64,
    /// Per-adapter circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_results: 5,
            default_max_examples: 3,
            max_results_limit: 50,
            adapter_timeout_ms: 2_000,
            search_ttl_seconds: 600,
            example_ttl_seconds: 3_600,
            partial_ttl_seconds: 60,
            cache_capacity: 1_000,
            sweep_interval_seconds: 60,
            health_window_seconds: 300,
            degraded_failure_rate: 0.25,
            unhealthy_failure_rate: 0.75,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validates this configuration.
    ///
    /// Every count and duration must be non-zero, the defaults must not
    /// exceed the limit, and the failure rates must satisfy
    /// `0 < degraded <= unhealthy <= 1`.
    pub fn validate(&self) -> Result<(), EngineError> {
        let non_zero = [
            ("default_max_results", self.default_max_results as u64),
            ("default_max_examples", self.default_max_examples as u64),
            ("max_results_limit", self.max_results_limit as u64),
            ("adapter_timeout_ms", self.adapter_timeout_ms),
            ("search_ttl_seconds", self.search_ttl_seconds),
            ("example_ttl_seconds", self.example_ttl_seconds),
            ("partial_ttl_seconds", self.partial_ttl_seconds),
            ("cache_capacity", self.cache_capacity),
            ("sweep_interval_seconds", self.sweep_interval_seconds),
            ("health_window_seconds", self.health_window_seconds),
            (
                "circuit_breaker.failure_threshold",
                u64::from(self.circuit_breaker.failure_threshold),
            ),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(EngineError::Config(format!(
                "{name} must be greater than 0"
            )));
        }
        if self.default_max_results > self.max_results_limit
            || self.default_max_examples > self.max_results_limit
        {
            return Err(EngineError::Config(
                "default result counts must be <= max_results_limit".into(),
            ));
        }
        let rates_valid = self.degraded_failure_rate > 0.0
            && self.degraded_failure_rate <= self.unhealthy_failure_rate
            && self.unhealthy_failure_rate <= 1.0;
        if !rates_valid {
            return Err(EngineError::Config(
                "failure rates must satisfy 0 < degraded_failure_rate <= unhealthy_failure_rate <= 1"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Per-adapter deadline.
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Default result count for `kind`.
    pub fn default_max_for(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Search => self.default_max_results,
            QueryKind::CodeExample => self.default_max_examples,
        }
    }

    /// Trailing window for health status.
    pub fn health_window(&self) -> Duration {
        Duration::from_secs(self.health_window_seconds)
    }

    /// Background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}
