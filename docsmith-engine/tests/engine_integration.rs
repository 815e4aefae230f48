//! End-to-end engine behaviour with scripted in-process adapters.
//!
//! No network: each adapter returns canned hits after an optional delay
//! and counts how often it was invoked.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docsmith_engine::{
    AdapterError, AdapterRegistry, CodeExample, DocsEngine, EngineConfig, EngineError,
    HealthMonitor, Hit, QueryKind, SearchHit, SourceAdapter,
};

struct ScriptedAdapter {
    id: &'static str,
    hits: Vec<(&'static str, f64)>,
    delay: Duration,
    failing: AtomicBool,
    calls: AtomicUsize,
    example_languages: Option<Vec<&'static str>>,
}

impl ScriptedAdapter {
    fn new(id: &'static str, hits: Vec<(&'static str, f64)>) -> Self {
        Self {
            id,
            hits,
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            example_languages: None,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    fn with_examples(mut self, languages: Vec<&'static str>) -> Self {
        self.example_languages = Some(languages);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<(), AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Http(format!("{} returned 500", self.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        self.id
    }

    fn supports(&self, kind: QueryKind, language: Option<&str>) -> bool {
        match kind {
            QueryKind::Search => true,
            QueryKind::CodeExample => match &self.example_languages {
                Some(languages) => {
                    language.is_none_or(|l| languages.iter().any(|known| *known == l))
                }
                None => false,
            },
        }
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchHit>, AdapterError> {
        self.respond().await?;
        Ok(self
            .hits
            .iter()
            .map(|(url, score)| SearchHit {
                title: format!("{term} at {url}"),
                snippet: String::new(),
                url: (*url).to_string(),
                source_adapter: self.id.to_string(),
                raw_score: *score,
            })
            .collect())
    }

    async fn fetch_examples(
        &self,
        function: &str,
        language: Option<&str>,
    ) -> Result<Vec<CodeExample>, AdapterError> {
        self.respond().await?;
        Ok(self
            .hits
            .iter()
            .map(|(url, score)| CodeExample {
                code: format!("{function}()  # {url}"),
                description: "Example".into(),
                source_adapter: self.id.to_string(),
                language: language.unwrap_or("python").to_string(),
                raw_score: *score,
            })
            .collect())
    }
}

fn engine_with(adapters: &[(Arc<ScriptedAdapter>, u32)], config: EngineConfig) -> DocsEngine {
    let mut builder = AdapterRegistry::builder().library("python").library("react");
    for (adapter, priority) in adapters {
        let adapter: Arc<dyn SourceAdapter> = adapter.clone();
        builder = builder.register("python", adapter, *priority);
    }
    let registry = builder.build().expect("registry");
    let health = Arc::new(HealthMonitor::from_config(&config));
    DocsEngine::new(Arc::new(registry), health, config).expect("engine")
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        adapter_timeout_ms: 200,
        ..Default::default()
    }
}

fn urls(hits: &[Hit]) -> Vec<String> {
    hits.iter()
        .map(|hit| match hit {
            Hit::Search(search) => search.url.clone(),
            Hit::Example(example) => example.code.clone(),
        })
        .collect()
}

fn seven_hits() -> (Arc<ScriptedAdapter>, Arc<ScriptedAdapter>) {
    let a = ScriptedAdapter::new(
        "python-docs",
        vec![
            ("https://docs.python.org/3/library/asyncio.html", 1.0),
            ("https://docs.python.org/3/library/asyncio-task.html", 0.9),
            ("https://docs.python.org/3/library/asyncio-eventloop.html", 0.8),
            ("https://docs.python.org/3/library/asyncio-stream.html", 0.7),
        ],
    );
    let b = ScriptedAdapter::new(
        "python-mirror",
        vec![
            ("https://mirror.test/asyncio-queue.html", 0.95),
            ("https://mirror.test/asyncio-sync.html", 0.6),
            ("https://mirror.test/asyncio-subprocess.html", 0.5),
        ],
    );
    (Arc::new(a), Arc::new(b))
}

#[tokio::test]
async fn default_search_returns_top_five_of_seven() {
    let (a, b) = seven_hits();
    let engine = engine_with(&[(a, 0), (b, 1)], fast_config());

    let result = engine
        .search_docs("python", "asyncio", None)
        .await
        .expect("result");

    assert_eq!(result.hits.len(), 5);
    assert!(!result.partial);
    assert_eq!(result.contributing_adapters.len(), 2);
    assert!(result.missing_adapters.is_empty());
    assert_eq!(
        urls(&result.hits)[..2],
        [
            "https://docs.python.org/3/library/asyncio.html".to_string(),
            "https://mirror.test/asyncio-queue.html".to_string(),
        ]
    );
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let (a, b) = seven_hits();
    let engine = engine_with(&[(a.clone(), 0), (b.clone(), 1)], fast_config());

    let first = engine.search_docs("python", "asyncio", None).await.expect("first");
    let second = engine
        .search_docs("PYTHON", "  asyncio ", None)
        .await
        .expect("second");

    assert_eq!(first, second);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(engine.cache_stats().hits, 1);
}

#[tokio::test]
async fn callers_share_cache_but_get_their_own_count() {
    let (a, b) = seven_hits();
    let engine = engine_with(&[(a.clone(), 0), (b, 1)], fast_config());

    let two = engine.search_docs("python", "asyncio", Some(2)).await.expect("two");
    let six = engine.search_docs("python", "asyncio", Some(6)).await.expect("six");

    assert_eq!(two.hits.len(), 2);
    assert_eq!(six.hits.len(), 6);
    assert_eq!(two.query.max_results(), 2);
    assert_eq!(six.query.max_results(), 6);
    assert_eq!(urls(&six.hits)[..2], urls(&two.hits)[..]);
    assert_eq!(a.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_queries_fan_out_once() {
    let a = Arc::new(
        ScriptedAdapter::new("python-docs", vec![("https://docs.python.org/3/", 1.0)])
            .delayed(Duration::from_millis(100)),
    );
    let engine = Arc::new(engine_with(&[(a.clone(), 0)], fast_config()));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.search_docs("python", "asyncio", None).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("result"))
        .collect();

    assert_eq!(a.calls(), 1);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn expired_entry_triggers_new_fan_out() {
    let a = Arc::new(ScriptedAdapter::new(
        "python-docs",
        vec![("https://docs.python.org/3/", 1.0)],
    ));
    let config = EngineConfig {
        search_ttl_seconds: 1,
        ..fast_config()
    };
    let engine = engine_with(&[(a.clone(), 0)], config);

    engine.search_docs("python", "asyncio", None).await.expect("first");
    engine.search_docs("python", "asyncio", None).await.expect("cached");
    assert_eq!(a.calls(), 1);

    tokio::time::sleep(Duration::from_millis(1_300)).await;
    engine.search_docs("python", "asyncio", None).await.expect("refreshed");
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn least_recently_used_query_is_evicted() {
    let a = Arc::new(ScriptedAdapter::new(
        "python-docs",
        vec![("https://docs.python.org/3/", 1.0)],
    ));
    let config = EngineConfig {
        cache_capacity: 2,
        ..fast_config()
    };
    let engine = engine_with(&[(a.clone(), 0)], config);

    for term in ["alpha", "beta", "alpha", "gamma"] {
        engine.search_docs("python", term, None).await.expect("result");
        engine.run_cache_maintenance().await;
    }
    assert_eq!(a.calls(), 3);

    engine.search_docs("python", "alpha", None).await.expect("alpha");
    assert_eq!(a.calls(), 3, "alpha was recently used and must stay cached");

    engine.search_docs("python", "beta", None).await.expect("beta");
    assert_eq!(a.calls(), 4, "beta was least recently used and must be recomputed");
}

#[tokio::test]
async fn timed_out_adapter_yields_partial_result() {
    let a = Arc::new(
        ScriptedAdapter::new("python-docs", vec![("https://docs.python.org/3/", 1.0)])
            .delayed(Duration::from_secs(5)),
    );
    let b = Arc::new(ScriptedAdapter::new(
        "python-mirror",
        vec![
            ("https://mirror.test/1", 0.9),
            ("https://mirror.test/2", 0.8),
            ("https://mirror.test/3", 0.7),
        ],
    ));
    let config = EngineConfig {
        adapter_timeout_ms: 100,
        ..Default::default()
    };
    let engine = engine_with(&[(a, 0), (b, 1)], config);

    let result = engine
        .search_docs("python", "asyncio", None)
        .await
        .expect("partial result");

    assert!(result.partial);
    assert_eq!(result.hits.len(), 3);
    assert!(result.hits.iter().all(|h| h.source_adapter() == "python-mirror"));
    assert!(result.missing_adapters.contains("python-docs"));
    assert!(result.contributing_adapters.contains("python-mirror"));

    let health = engine.health();
    assert_eq!(health.adapters["python-docs"].timeout_count, 1);
    assert_eq!(health.adapters["python-mirror"].success_count, 1);
}

#[tokio::test]
async fn partial_result_expires_sooner() {
    let a = Arc::new(
        ScriptedAdapter::new("python-docs", vec![("https://docs.python.org/3/", 1.0)]).failing(),
    );
    let b = Arc::new(ScriptedAdapter::new(
        "python-mirror",
        vec![("https://mirror.test/1", 0.9)],
    ));
    let config = EngineConfig {
        partial_ttl_seconds: 1,
        ..fast_config()
    };
    let engine = engine_with(&[(a.clone(), 0), (b.clone(), 1)], config);

    let partial = engine.search_docs("python", "asyncio", None).await.expect("partial");
    assert!(partial.partial);

    a.failing.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1_300)).await;

    let complete = engine.search_docs("python", "asyncio", None).await.expect("complete");
    assert!(!complete.partial);
    assert_eq!(complete.hits.len(), 2);
    assert_eq!(b.calls(), 2);
}

#[tokio::test]
async fn total_failure_is_reported_and_not_cached() {
    let a = Arc::new(
        ScriptedAdapter::new("python-docs", vec![("https://docs.python.org/3/", 1.0)]).failing(),
    );
    let b = Arc::new(
        ScriptedAdapter::new("python-mirror", vec![("https://mirror.test/1", 0.9)])
            .delayed(Duration::from_secs(5)),
    );
    let config = EngineConfig {
        adapter_timeout_ms: 100,
        ..Default::default()
    };
    let engine = engine_with(&[(a.clone(), 0), (b, 1)], config);

    let err = engine.search_docs("python", "asyncio", None).await.unwrap_err();
    assert!(matches!(err, EngineError::NoResultsAvailable { ref library, .. } if library == "python"));
    assert_eq!(err.status_code(), 503);

    a.failing.store(false, Ordering::SeqCst);
    let result = engine
        .search_docs("python", "asyncio", None)
        .await
        .expect("recovered");
    assert_eq!(a.calls(), 2);
    assert!(result.partial);
    assert_eq!(engine.health().outages["python"].all_adapters_failed, 1);
}

#[tokio::test]
async fn ranking_is_independent_of_arrival_order() {
    let build = |a_delay: u64, b_delay: u64| {
        let a = Arc::new(
            ScriptedAdapter::new(
                "A",
                vec![("https://a.test/hit", 0.9), ("https://a.test/low", 0.5)],
            )
            .delayed(Duration::from_millis(a_delay)),
        );
        let b = Arc::new(
            ScriptedAdapter::new("B", vec![("https://b.test/hit", 0.9)])
                .delayed(Duration::from_millis(b_delay)),
        );
        engine_with(&[(a, 0), (b, 1)], fast_config())
    };

    let a_first = build(0, 50)
        .search_docs("python", "gather", None)
        .await
        .expect("result");
    let b_first = build(50, 0)
        .search_docs("python", "gather", None)
        .await
        .expect("result");

    let expected = vec![
        "https://a.test/hit".to_string(),
        "https://b.test/hit".to_string(),
        "https://a.test/low".to_string(),
    ];
    assert_eq!(urls(&a_first.hits), expected);
    assert_eq!(urls(&b_first.hits), expected);
}

#[tokio::test]
async fn invalid_queries_never_reach_adapters() {
    let (a, b) = seven_hits();
    let engine = engine_with(&[(a.clone(), 0), (b, 1)], fast_config());

    let blank = engine.search_docs("python", "   ", None).await.unwrap_err();
    assert!(matches!(blank, EngineError::InvalidQuery(_)));
    assert_eq!(blank.status_code(), 422);

    let zero = engine
        .search_docs("python", "asyncio", Some(0))
        .await
        .unwrap_err();
    assert!(matches!(zero, EngineError::InvalidQuery(_)));

    let unknown = engine.search_docs("cobol", "move", None).await.unwrap_err();
    assert_eq!(unknown.status_code(), 404);

    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn library_without_adapters_reports_no_results() {
    let engine = engine_with(&[], fast_config());
    let err = engine.search_docs("react", "useState", None).await.unwrap_err();
    assert!(matches!(err, EngineError::NoResultsAvailable { .. }));
    assert_eq!(engine.health().outages["react"].no_adapters, 1);
}

#[tokio::test]
async fn code_examples_respect_language_filter() {
    let a = Arc::new(
        ScriptedAdapter::new("python-docs", vec![("asyncio.run", 1.0), ("asyncio.gather", 0.9)])
            .with_examples(vec!["python"]),
    );
    let b = Arc::new(ScriptedAdapter::new(
        "python-mirror",
        vec![("https://mirror.test/1", 0.9)],
    ));
    let engine = engine_with(&[(a.clone(), 0), (b.clone(), 1)], fast_config());

    let result = engine
        .code_examples("python", "asyncio", Some("Python"), None)
        .await
        .expect("examples");
    assert_eq!(result.query.kind(), QueryKind::CodeExample);
    assert_eq!(result.query.language(), Some("python"));
    assert_eq!(result.hits.len(), 2);
    assert!(!result.partial);
    assert_eq!(b.calls(), 0, "search-only adapter is not relevant");

    let err = engine
        .code_examples("python", "asyncio", Some("rust"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoResultsAvailable { .. }));
}

#[tokio::test]
async fn search_and_examples_cached_separately() {
    let a = Arc::new(
        ScriptedAdapter::new("python-docs", vec![("asyncio.run", 1.0)]).with_examples(vec![]),
    );
    let engine = engine_with(&[(a.clone(), 0)], fast_config());

    engine.search_docs("python", "asyncio", None).await.expect("search");
    engine
        .code_examples("python", "asyncio", None, None)
        .await
        .expect("examples");
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn separator_characters_never_share_a_cache_entry() {
    let a = Arc::new(
        ScriptedAdapter::new("python-docs", vec![("builtins", 1.0)])
            .with_examples(vec!["py:x", "py", "*"]),
    );
    let engine = engine_with(&[(a.clone(), 0)], fast_config());

    let cases = [
        ("open", Some("py:x")),
        ("x:open", Some("py")),
        ("open", None),
        ("open", Some("*")),
    ];
    for (function, language) in cases {
        let result = engine
            .code_examples("python", function, language, None)
            .await
            .expect("examples");
        assert_eq!(result.query.term(), function);
        match &result.hits[0] {
            Hit::Example(example) => {
                assert_eq!(example.code, format!("{function}()  # builtins"));
                assert_eq!(example.language, language.unwrap_or("python"));
            }
            other => panic!("unexpected hit {other:?}"),
        }
    }

    assert_eq!(a.calls(), cases.len());
    assert_eq!(engine.cache_stats().computations, cases.len() as u64);
}

#[tokio::test]
async fn health_report_reflects_traffic() {
    let (a, b) = seven_hits();
    let engine = engine_with(&[(a, 0), (b, 1)], fast_config());
    assert_eq!(
        engine.health().status,
        docsmith_engine::OverallStatus::Healthy
    );

    engine.search_docs("python", "asyncio", None).await.expect("result");
    let report = engine.health();
    assert_eq!(report.adapters.len(), 2);
    assert_eq!(report.status, docsmith_engine::OverallStatus::Healthy);
    assert_eq!(report.cache.computations, 1);
    assert!(report
        .circuits
        .iter()
        .all(|c| c.state == docsmith_engine::CircuitState::Closed));
}
