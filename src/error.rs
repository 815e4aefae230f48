//! Error types for the docsmith host.

use docsmith_engine::EngineError;

/// Top-level error type for configuration and engine bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration file could not be parsed or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
