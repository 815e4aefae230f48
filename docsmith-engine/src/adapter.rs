//! Trait definition for pluggable documentation sources.
//!
//! Each documentation source, such as a docs site or an example repository,
//! implements [`SourceAdapter`] to provide a uniform search / example
//! interface. The registry holds adapters as `Arc<dyn SourceAdapter>`, so
//! the trait is object safe via [`async_trait`].

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::types::{CodeExample, Hit, Query, QueryKind, SearchHit};

/// A pluggable documentation source for one library.
///
/// Implementors are responsible for their own request construction and
/// response parsing. Errors stay local: the aggregator turns them into
/// missing-adapter bookkeeping.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier, unique within a library.
    fn id(&self) -> &str;

    /// Whether this adapter can serve `kind` for the given language filter.
    ///
    /// The default serves searches only.
    fn supports(&self, kind: QueryKind, language: Option<&str>) -> bool {
        let _ = language;
        kind == QueryKind::Search
    }

    /// Search the source for `term`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if the source cannot be reached or parsed.
    async fn search(&self, term: &str) -> Result<Vec<SearchHit>, AdapterError>;

    /// Fetch code examples for `function`.
    ///
    /// # Errors
    ///
    /// The default returns [`AdapterError::Unsupported`].
    async fn fetch_examples(
        &self,
        function: &str,
        language: Option<&str>,
    ) -> Result<Vec<CodeExample>, AdapterError> {
        let _ = (function, language);
        Err(AdapterError::Unsupported(format!(
            "{} does not provide code examples",
            self.id()
        )))
    }
}

/// Dispatch `query` to the adapter operation matching its kind.
pub async fn invoke(adapter: &dyn SourceAdapter, query: &Query) -> Result<Vec<Hit>, AdapterError> {
    match query.kind() {
        QueryKind::Search => Ok(adapter
            .search(query.term())
            .await?
            .into_iter()
            .map(Hit::from)
            .collect()),
        QueryKind::CodeExample => Ok(adapter
            .fetch_examples(query.term(), query.language())
            .await?
            .into_iter()
            .map(Hit::from)
            .collect()),
    }
}
