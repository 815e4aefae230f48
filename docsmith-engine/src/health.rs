//! Passive health monitoring of adapter invocations.
//!
//! The aggregator reports every adapter attempt here. Per-adapter counters
//! are atomics behind a lock-sharded map, so recording never takes a lock
//! wider than one map shard and snapshots never wait on recorders beyond
//! copying one adapter's last error.
//!
//! # Design
//!
//! Lifetime counters are exact and monotonic. The trailing window used
//! for [`HealthMonitor::overall_status`] is a ring of time buckets that is
//! approximate under contention (a count can be lost while a bucket rolls
//! over), which is fine for a status signal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

const WINDOW_BUCKETS: u64 = 10;
const NO_LATENCY: u64 = u64::MAX;

/// Result of a single adapter attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// The adapter answered in time.
    Success,
    /// The adapter returned an error.
    Failure {
        /// Error text, recorded as the adapter's last error.
        error: String,
    },
    /// The adapter missed its deadline.
    Timeout,
}

impl AdapterOutcome {
    fn is_failure(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Aggregated counters for one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterHealthRecord {
    /// Adapter id.
    pub adapter_id: String,
    /// Lifetime successful attempts.
    pub success_count: u64,
    /// Lifetime failed attempts.
    pub failure_count: u64,
    /// Lifetime timed-out attempts.
    pub timeout_count: u64,
    /// Latency of the most recent attempt in milliseconds.
    pub last_latency_ms: Option<u64>,
    /// Error text of the most recent failure or timeout.
    pub last_error: Option<String>,
}

/// Coarse engine health derived from the trailing failure rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Failure rate below the degraded threshold (or no traffic).
    Healthy,
    /// Failure rate at or above the degraded threshold.
    Degraded,
    /// Failure rate at or above the unhealthy threshold.
    Unhealthy,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Why a query for a library produced nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutageCause {
    /// No adapter is registered for the library, kind and language.
    NoAdapters,
    /// Every relevant adapter failed, timed out, or was skipped.
    AllAdaptersFailed,
}

/// Per-library outage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryOutages {
    /// Queries with no relevant adapter.
    pub no_adapters: u64,
    /// Queries where every relevant adapter failed.
    pub all_adapters_failed: u64,
}

#[derive(Default)]
struct Bucket {
    epoch: AtomicU64,
    attempts: AtomicU64,
    failures: AtomicU64,
}

struct AdapterSlot {
    success: AtomicU64,
    failure: AtomicU64,
    timeout: AtomicU64,
    last_latency_us: AtomicU64,
    last_error: Mutex<Option<String>>,
    buckets: [Bucket; WINDOW_BUCKETS as usize],
}

impl Default for AdapterSlot {
    fn default() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            timeout: AtomicU64::new(0),
            last_latency_us: AtomicU64::new(NO_LATENCY),
            last_error: Mutex::new(None),
            buckets: Default::default(),
        }
    }
}

impl AdapterSlot {
    fn add_to_window(&self, epoch: u64, failed: bool) {
        let bucket = &self.buckets[(epoch % WINDOW_BUCKETS) as usize];
        let seen = bucket.epoch.load(Ordering::Acquire);
        if seen != epoch
            && bucket
                .epoch
                .compare_exchange(seen, epoch, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            bucket.attempts.store(0, Ordering::Release);
            bucket.failures.store(0, Ordering::Release);
        }
        bucket.attempts.fetch_add(1, Ordering::AcqRel);
        if failed {
            bucket.failures.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// `(attempts, failures)` in buckets no older than the window.
    fn window_totals(&self, current_epoch: u64) -> (u64, u64) {
        self.buckets
            .iter()
            .filter(|b| {
                let epoch = b.epoch.load(Ordering::Acquire);
                epoch != 0 && current_epoch.saturating_sub(epoch) < WINDOW_BUCKETS
            })
            .fold((0, 0), |(attempts, failures), b| {
                (
                    attempts + b.attempts.load(Ordering::Acquire),
                    failures + b.failures.load(Ordering::Acquire),
                )
            })
    }

    fn record(&self, adapter_id: &str) -> AdapterHealthRecord {
        let latency = self.last_latency_us.load(Ordering::Acquire);
        AdapterHealthRecord {
            adapter_id: adapter_id.to_owned(),
            success_count: self.success.load(Ordering::Acquire),
            failure_count: self.failure.load(Ordering::Acquire),
            timeout_count: self.timeout.load(Ordering::Acquire),
            last_latency_ms: (latency != NO_LATENCY).then_some(latency / 1_000),
            last_error: self
                .last_error
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Default)]
struct OutageSlot {
    no_adapters: AtomicU64,
    all_adapters_failed: AtomicU64,
}

/// Process-lifetime health ledger shared by every query path.
pub struct HealthMonitor {
    origin: Instant,
    bucket_len: Duration,
    degraded_failure_rate: f64,
    unhealthy_failure_rate: f64,
    adapters: DashMap<String, Arc<AdapterSlot>>,
    outages: DashMap<String, Arc<OutageSlot>>,
}

impl HealthMonitor {
    /// Create a monitor with a trailing `window` and failure-rate thresholds.
    pub fn new(window: Duration, degraded_failure_rate: f64, unhealthy_failure_rate: f64) -> Self {
        let bucket_len = (window / WINDOW_BUCKETS as u32).max(Duration::from_millis(1));
        Self {
            origin: Instant::now(),
            bucket_len,
            degraded_failure_rate,
            unhealthy_failure_rate,
            adapters: DashMap::new(),
            outages: DashMap::new(),
        }
    }

    /// Create a monitor from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.health_window(),
            config.degraded_failure_rate,
            config.unhealthy_failure_rate,
        )
    }

    /// Record one adapter attempt.
    pub fn record(&self, adapter_id: &str, outcome: &AdapterOutcome, latency: Duration) {
        let slot = self.slot(adapter_id);
        match outcome {
            AdapterOutcome::Success => {
                slot.success.fetch_add(1, Ordering::AcqRel);
            }
            AdapterOutcome::Failure { error } => {
                slot.failure.fetch_add(1, Ordering::AcqRel);
                if let Ok(mut last) = slot.last_error.lock() {
                    *last = Some(error.clone());
                }
            }
            AdapterOutcome::Timeout => {
                slot.timeout.fetch_add(1, Ordering::AcqRel);
                if let Ok(mut last) = slot.last_error.lock() {
                    *last = Some(format!("timed out after {}ms", latency.as_millis()));
                }
            }
        }
        let micros = u64::try_from(latency.as_micros()).unwrap_or(NO_LATENCY - 1);
        slot.last_latency_us.store(micros, Ordering::Release);
        slot.add_to_window(self.current_epoch(), outcome.is_failure());
    }

    /// Record that a query for `library` produced nothing.
    pub fn record_outage(&self, library: &str, cause: OutageCause) {
        let slot = self
            .outages
            .entry(library.to_owned())
            .or_default()
            .value()
            .clone();
        match cause {
            OutageCause::NoAdapters => slot.no_adapters.fetch_add(1, Ordering::AcqRel),
            OutageCause::AllAdaptersFailed => {
                slot.all_adapters_failed.fetch_add(1, Ordering::AcqRel)
            }
        };
    }

    /// Copy of every adapter's record, keyed by adapter id.
    pub fn snapshot(&self) -> BTreeMap<String, AdapterHealthRecord> {
        self.slots()
            .into_iter()
            .map(|(id, slot)| {
                let record = slot.record(&id);
                (id, record)
            })
            .collect()
    }

    /// Per-library outage counters.
    pub fn outages(&self) -> BTreeMap<String, LibraryOutages> {
        self.outages
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    LibraryOutages {
                        no_adapters: entry.no_adapters.load(Ordering::Acquire),
                        all_adapters_failed: entry.all_adapters_failed.load(Ordering::Acquire),
                    },
                )
            })
            .collect()
    }

    /// Status from the failure rate of all attempts in the trailing window.
    pub fn overall_status(&self) -> OverallStatus {
        let epoch = self.current_epoch();
        let (attempts, failures) = self
            .slots()
            .iter()
            .map(|(_, slot)| slot.window_totals(epoch))
            .fold((0u64, 0u64), |(a, f), (sa, sf)| (a + sa, f + sf));
        self.classify(attempts, failures)
    }

    /// Status of a single adapter over the trailing window.
    pub fn adapter_status(&self, adapter_id: &str) -> OverallStatus {
        let epoch = self.current_epoch();
        let totals = self
            .adapters
            .get(adapter_id)
            .map(|slot| slot.window_totals(epoch))
            .unwrap_or_default();
        self.classify(totals.0, totals.1)
    }

    fn classify(&self, attempts: u64, failures: u64) -> OverallStatus {
        if attempts == 0 {
            return OverallStatus::Healthy;
        }
        let rate = failures as f64 / attempts as f64;
        if rate >= self.unhealthy_failure_rate {
            OverallStatus::Unhealthy
        } else if rate >= self.degraded_failure_rate {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        }
    }

    fn slot(&self, adapter_id: &str) -> Arc<AdapterSlot> {
        if let Some(slot) = self.adapters.get(adapter_id) {
            return slot.value().clone();
        }
        self.adapters
            .entry(adapter_id.to_owned())
            .or_default()
            .value()
            .clone()
    }

    /// Clone the slot handles so no shard lock is held while reading them.
    fn slots(&self) -> Vec<(String, Arc<AdapterSlot>)> {
        self.adapters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn current_epoch(&self) -> u64 {
        let elapsed = self.origin.elapsed().as_nanos();
        let bucket = self.bucket_len.as_nanos().max(1);
        u64::try_from(elapsed / bucket).unwrap_or(u64::MAX - 1) + 1
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("adapters", &self.adapters.len())
            .field("bucket_len", &self.bucket_len)
            .finish()
    }
}
