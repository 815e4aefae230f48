//! Per-adapter circuit breaker.
//!
//! Tracks consecutive failures per adapter and temporarily stops invoking
//! adapters that keep failing. After a cooldown a tripped adapter enters a
//! half-open state where a single probe request decides whether to restore
//! or re-trip the circuit. Other requests are skipped while the probe is out.
//! A probe that never reports back (its query was dropped) is replaced
//! after another cooldown.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Circuit breaker state for a single adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Adapter is healthy; all requests go through.
    Closed,
    /// Adapter failed too often; requests are skipped until cooldown expires.
    Open,
    /// Cooldown elapsed; one probe request tests for recovery.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct AdapterCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    probe_started_at: Option<Instant>,
}

impl Default for AdapterCircuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            probe_started_at: None,
        }
    }
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Whether open circuits cause adapters to be skipped at all.
    pub enabled: bool,
    /// Consecutive failures (errors or timeouts) before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds to stay open before allowing a probe.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            cooldown_secs: 30,
        }
    }
}

/// Independent circuits keyed by adapter id.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    adapters: HashMap<String, AdapterCircuit>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            adapters: HashMap::new(),
        }
    }

    /// Record a successful call; closes the circuit.
    pub fn record_success(&mut self, adapter_id: &str) {
        let circuit = self.circuit_mut(adapter_id);
        circuit.state = CircuitState::Closed;
        circuit.consecutive_failures = 0;
        circuit.probe_started_at = None;
    }

    /// Record a failed or timed-out call; opens the circuit at the threshold.
    pub fn record_failure(&mut self, adapter_id: &str) {
        let threshold = self.config.failure_threshold;
        let circuit = self.circuit_mut(adapter_id);
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        circuit.last_failure_at = Some(Instant::now());
        circuit.probe_started_at = None;

        if circuit.state == CircuitState::HalfOpen || circuit.consecutive_failures >= threshold {
            circuit.state = CircuitState::Open;
        }
    }

    /// Whether the adapter should be invoked now.
    ///
    /// Always `true` when the breaker is disabled. An open circuit whose
    /// cooldown has elapsed moves to [`CircuitState::HalfOpen`] and lets this
    /// caller through as the probe; later callers are refused until the
    /// probe's outcome is recorded.
    pub fn should_attempt(&mut self, adapter_id: &str) -> bool {
        if !self.config.enabled {
            return true;
        }
        let cooldown_secs = self.config.cooldown_secs;
        let circuit = self.circuit_mut(adapter_id);

        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let probe_stale = circuit
                    .probe_started_at
                    .is_none_or(|t| t.elapsed().as_secs() >= cooldown_secs);
                if probe_stale {
                    circuit.probe_started_at = Some(Instant::now());
                }
                probe_stale
            }
            CircuitState::Open => {
                let cooldown_elapsed = circuit
                    .last_failure_at
                    .is_none_or(|t| t.elapsed().as_secs() >= cooldown_secs);
                if cooldown_elapsed {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.probe_started_at = Some(Instant::now());
                }
                cooldown_elapsed
            }
        }
    }

    /// Current state of one adapter's circuit.
    pub fn adapter_status(&self, adapter_id: &str) -> CircuitState {
        self.adapters
            .get(adapter_id)
            .map_or(CircuitState::Closed, |c| c.state)
    }

    /// `(adapter, state, consecutive_failures)` for every adapter seen so far.
    pub fn health_report(&self) -> Vec<(String, CircuitState, u32)> {
        let mut report: Vec<_> = self
            .adapters
            .iter()
            .map(|(id, c)| (id.clone(), c.state, c.consecutive_failures))
            .collect();
        report.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    fn circuit_mut(&mut self, adapter_id: &str) -> &mut AdapterCircuit {
        self.adapters.entry(adapter_id.to_owned()).or_default()
    }
}
