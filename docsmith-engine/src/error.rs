//! Error types for the docsmith-engine crate.
//!
//! [`EngineError`] is the only error that crosses the engine boundary.
//! [`AdapterError`] stays inside the fan-out: individual adapter failures
//! are converted into missing-adapter bookkeeping and never reach callers.

use std::time::Duration;

/// Errors surfaced to callers of the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Malformed input (empty term, zero result limit).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The requested library has no entry in the adapter registry.
    #[error("unknown library: {0}")]
    UnknownLibrary(String),

    /// Every relevant adapter failed or timed out, or none was relevant.
    #[error("no results available for {library}: {reason}")]
    NoResultsAvailable {
        /// Library the query targeted.
        library: String,
        /// Why nothing could be returned.
        reason: String,
    },

    /// Invalid engine or registry configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// HTTP status an outer request layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidQuery(_) => 422,
            Self::UnknownLibrary(_) => 404,
            Self::NoResultsAvailable { .. } => 503,
            Self::Config(_) => 500,
        }
    }
}

/// Errors raised by a single source adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// The adapter did not answer within its deadline.
    #[error("adapter timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// An HTTP request to the upstream source failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The upstream response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The adapter cannot serve this kind of request.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Any other adapter failure, including a panicked adapter task.
    #[error("adapter failed: {0}")]
    Failed(String),
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
