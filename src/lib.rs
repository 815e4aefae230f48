//! Docsmith: documentation search and code-example lookup across
//! library documentation sites.
//!
//! The retrieval engine lives in [`docsmith_engine`]; this crate adds the
//! TOML configuration with the built-in libraries and wires it into a
//! ready engine for the `docsmith` binary.

pub mod bootstrap;
pub mod config;
pub mod error;

pub use bootstrap::{build_engine, build_registry};
pub use config::{AdapterEntry, DocsmithConfig, LibraryConfig};
pub use error::{AppError, Result};
