//! Builds a ready [`DocsEngine`] from a [`DocsmithConfig`].

use std::sync::Arc;

use docsmith_engine::adapters::DocSiteAdapter;
use docsmith_engine::{AdapterRegistry, DocsEngine, HealthMonitor};

use crate::config::DocsmithConfig;
use crate::error::Result;

/// Register one [`DocSiteAdapter`] per configured site.
///
/// Libraries with no sites are still declared, so queries for them fail
/// with "no results" rather than "unknown library".
///
/// # Errors
///
/// Returns an error if the config is invalid or a site description is rejected.
pub fn build_registry(config: &DocsmithConfig) -> Result<AdapterRegistry> {
    config.validate()?;
    let mut builder = AdapterRegistry::builder();
    for library in &config.libraries {
        builder = builder.library(&library.name);
        for entry in &library.adapters {
            let adapter = DocSiteAdapter::new(entry.site.clone())?;
            builder = builder.register(&library.name, Arc::new(adapter), entry.priority);
        }
    }
    Ok(builder.build()?)
}

/// Build the engine and its health monitor.
///
/// # Errors
///
/// Same as [`build_registry`], plus invalid engine settings.
pub fn build_engine(config: &DocsmithConfig) -> Result<DocsEngine> {
    let registry = build_registry(config)?;
    let health = Arc::new(HealthMonitor::from_config(&config.engine));
    Ok(DocsEngine::new(
        Arc::new(registry),
        health,
        config.engine.clone(),
    )?)
}
