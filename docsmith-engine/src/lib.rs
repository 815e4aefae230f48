//! # docsmith-engine
//!
//! Documentation retrieval and caching engine.
//!
//! Given a library and a term, the engine asks every documentation source
//! registered for that library, merges their hits into one deterministic
//! ranking, and caches the outcome so repeated and concurrent queries cost
//! one upstream round trip.
//!
//! ## Design
//!
//! - Sources implement [`SourceAdapter`]; [`adapters::DocSiteAdapter`]
//!   scrapes HTML documentation sites with CSS selectors
//! - Each query fans out to all relevant adapters concurrently, each under
//!   its own deadline; late or failing adapters make the result partial
//!   instead of failing it
//! - Single-flight cache with per-kind TTL, a shorter TTL for partial
//!   results, LRU eviction, and no caching of failures
//! - Passive health monitoring of every adapter call, plus a per-adapter
//!   circuit breaker
//!
//! ## Logging
//!
//! Query terms are logged only at trace level.
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> docsmith_engine::Result<()> {
//! use std::sync::Arc;
//! use docsmith_engine::adapters::{DocSiteAdapter, DocSiteConfig};
//! use docsmith_engine::{AdapterRegistry, DocsEngine, EngineConfig, HealthMonitor};
//!
//! let site = DocSiteAdapter::new(DocSiteConfig {
//!     id: "python-docs".into(),
//!     weight: 1.0,
//!     search_url: "https://docs.python.org/3/search.html?q={query}".into(),
//!     result_selector: "ul.search li".into(),
//!     link_selector: "a".into(),
//!     snippet_selector: Some(".context".into()),
//!     link_base: "https://docs.python.org/3/".into(),
//!     examples_url: None,
//!     example_languages: vec![],
//!     user_agent: None,
//!     request_timeout_ms: 1_800,
//! })?;
//! let registry = AdapterRegistry::builder()
//!     .register("python", Arc::new(site), 0)
//!     .build()?;
//! let config = EngineConfig::default();
//! let health = Arc::new(HealthMonitor::from_config(&config));
//! let engine = DocsEngine::new(Arc::new(registry), health, config)?;
//!
//! let result = engine.search_docs("python", "asyncio", Some(5)).await?;
//! for hit in &result.hits {
//!     println!("{hit:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod registry;
pub mod types;

pub use adapter::SourceAdapter;
pub use cache::{CacheStats, ResultCache, TtlPolicy};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState};
pub use config::EngineConfig;
pub use engine::{CircuitReport, DocsEngine, HealthReport};
pub use error::{AdapterError, EngineError, Result};
pub use health::{AdapterHealthRecord, AdapterOutcome, HealthMonitor, OverallStatus};
pub use registry::{AdapterRegistry, RegisteredAdapter};
pub use types::{CacheKey, CodeExample, Hit, Query, QueryKind, RankedResult, RawQuery, SearchHit};
