//! Concrete [`crate::SourceAdapter`] implementations.

pub mod doc_site;

pub use doc_site::{DocSiteAdapter, DocSiteConfig};
