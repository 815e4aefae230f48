//! Query normalisation: raw request fields → validated [`Query`] + [`CacheKey`].
//!
//! Pure and synchronous. The library is lower-cased and must be registered,
//! the term is trimmed with inner whitespace collapsed but keeps its case
//! (function names are case-sensitive). The language is lower-cased and the
//! result count is defaulted per kind, then clamped to the configured limit.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::AdapterRegistry;
use crate::types::{CacheKey, Query, RawQuery};

/// Validate and canonicalise `raw`.
///
/// # Errors
///
/// - [`EngineError::UnknownLibrary`] if the library is empty or not registered.
/// - [`EngineError::InvalidQuery`] if the term is blank or `max_results` is zero.
pub fn normalize(
    raw: &RawQuery,
    registry: &AdapterRegistry,
    config: &EngineConfig,
) -> Result<(Query, CacheKey)> {
    let library = raw.library.trim().to_lowercase();
    if library.is_empty() || !registry.contains(&library) {
        return Err(EngineError::UnknownLibrary(raw.library.trim().to_owned()));
    }

    let term = raw.term.split_whitespace().collect::<Vec<_>>().join(" ");
    if term.is_empty() {
        return Err(EngineError::InvalidQuery(format!(
            "{} term must not be empty",
            raw.kind
        )));
    }

    let max_results = match raw.max_results {
        Some(0) => {
            return Err(EngineError::InvalidQuery(
                "max_results must be greater than 0".into(),
            ));
        }
        Some(requested) => requested.min(config.max_results_limit),
        None => config.default_max_for(raw.kind),
    };

    let language = raw
        .language
        .as_deref()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty());

    let query = Query::new(library, term, raw.kind, language, max_results);
    let key = query.cache_key();
    Ok((query, key))
}
