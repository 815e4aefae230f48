//! Core types: queries, cache keys, hits, and ranked results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a query asks the adapters for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Documentation search hits.
    Search,
    /// Code examples for a function.
    CodeExample,
}

impl QueryKind {
    /// Stable lower-case name, used in cache keys and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::CodeExample => "code_example",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw, unvalidated query as handed over by the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuery {
    /// Library identifier, any case.
    pub library: String,
    /// Search term, or function name for code examples.
    pub term: String,
    /// Kind of results requested.
    pub kind: QueryKind,
    /// Optional language filter (code examples).
    pub language: Option<String>,
    /// Requested result count; the configured default applies when `None`.
    pub max_results: Option<usize>,
}

impl RawQuery {
    /// A documentation search for `term` in `library`.
    pub fn search(library: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            term: term.into(),
            kind: QueryKind::Search,
            language: None,
            max_results: None,
        }
    }

    /// A code-example lookup for `function` in `library`.
    pub fn code_example(library: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            term: function.into(),
            kind: QueryKind::CodeExample,
            language: None,
            max_results: None,
        }
    }

    /// Set the language filter.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the requested result count.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// A validated, normalised query. Only the normaliser constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    library: String,
    term: String,
    kind: QueryKind,
    language: Option<String>,
    max_results: usize,
}

impl Query {
    pub(crate) fn new(
        library: String,
        term: String,
        kind: QueryKind,
        language: Option<String>,
        max_results: usize,
    ) -> Self {
        Self {
            library,
            term,
            kind,
            language,
            max_results,
        }
    }

    /// Lower-cased library identifier.
    pub fn library(&self) -> &str {
        &self.library
    }

    /// Trimmed term with inner whitespace collapsed.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Requested kind.
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Lower-cased language filter, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Result count after defaulting and clamping. Always greater than zero.
    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// The canonical cache key for this query.
    ///
    /// Components are percent-encoded and joined with `:`, so no component
    /// can spill into the next. A missing language is an empty component;
    /// a present one is never empty after normalisation.
    ///
    /// The result count is deliberately not part of the key: the cache
    /// stores the full ranked list and each caller receives its own prefix.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey(format!(
            "{}:{}:{}:{}",
            self.kind,
            encode_component(&self.library),
            encode_component(self.language.as_deref().unwrap_or_default()),
            encode_component(&self.term)
        ))
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Canonical string identifying a cacheable query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single documentation search hit produced by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Page or section title.
    pub title: String,
    /// Short text excerpt.
    pub snippet: String,
    /// Absolute URL of the documentation page.
    pub url: String,
    /// Id of the adapter that produced this hit.
    pub source_adapter: String,
    /// Adapter-assigned relevance, higher is better.
    pub raw_score: f64,
}

/// A code example produced by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeExample {
    /// The example source code.
    pub code: String,
    /// Nearest heading or other description of the example.
    pub description: String,
    /// Id of the adapter that produced this example.
    pub source_adapter: String,
    /// Language of the code.
    pub language: String,
    /// Adapter-assigned relevance, higher is better.
    pub raw_score: f64,
}

/// Either kind of result, as stored in a [`RankedResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Hit {
    /// A documentation search hit.
    Search(SearchHit),
    /// A code example.
    Example(CodeExample),
}

impl Hit {
    /// Adapter-assigned score.
    pub fn raw_score(&self) -> f64 {
        match self {
            Self::Search(hit) => hit.raw_score,
            Self::Example(example) => example.raw_score,
        }
    }

    /// Id of the producing adapter.
    pub fn source_adapter(&self) -> &str {
        match self {
            Self::Search(hit) => &hit.source_adapter,
            Self::Example(example) => &example.source_adapter,
        }
    }

    /// Rough heap footprint in bytes, used as the cache size hint.
    pub fn size_hint(&self) -> usize {
        match self {
            Self::Search(hit) => {
                hit.title.len() + hit.snippet.len() + hit.url.len() + hit.source_adapter.len()
            }
            Self::Example(example) => {
                example.code.len()
                    + example.description.len()
                    + example.source_adapter.len()
                    + example.language.len()
            }
        }
    }
}

impl From<SearchHit> for Hit {
    fn from(hit: SearchHit) -> Self {
        Self::Search(hit)
    }
}

impl From<CodeExample> for Hit {
    fn from(example: CodeExample) -> Self {
        Self::Example(example)
    }
}

/// The outcome of one query: ordered hits plus adapter bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// The query this result answers.
    pub query: Query,
    /// Ranked hits, at most `query.max_results()` long when handed to callers.
    pub hits: Vec<Hit>,
    /// `true` iff at least one relevant adapter failed, timed out, or was skipped.
    pub partial: bool,
    /// Adapters that answered in time.
    pub contributing_adapters: BTreeSet<String>,
    /// Adapters whose results are missing.
    pub missing_adapters: BTreeSet<String>,
}

impl RankedResult {
    /// A copy of this result addressed to `query`, truncated to its limit.
    pub fn for_query(&self, query: &Query) -> RankedResult {
        let mut view = self.clone();
        view.hits.truncate(query.max_results());
        view.query = query.clone();
        view
    }

    /// Rough heap footprint in bytes.
    pub fn size_hint(&self) -> usize {
        self.hits.iter().map(Hit::size_hint).sum::<usize>() + self.query.term().len()
    }
}
