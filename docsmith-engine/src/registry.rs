//! Static mapping from library identifiers to their source adapters.
//!
//! Built once at startup through [`AdapterRegistryBuilder`] and read-only
//! afterwards. Hosts share it as `Arc<AdapterRegistry>`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::adapter::SourceAdapter;
use crate::error::{EngineError, Result};
use crate::types::QueryKind;

/// An adapter together with its ranking priority (lower is preferred).
#[derive(Clone)]
pub struct RegisteredAdapter {
    adapter: Arc<dyn SourceAdapter>,
    priority: u32,
}

impl RegisteredAdapter {
    /// Pair `adapter` with `priority`.
    pub fn new(adapter: Arc<dyn SourceAdapter>, priority: u32) -> Self {
        Self { adapter, priority }
    }

    /// The adapter's id.
    pub fn id(&self) -> &str {
        self.adapter.id()
    }

    /// Configured priority; lower numbers win score ties.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Shared handle to the adapter.
    pub fn adapter(&self) -> &Arc<dyn SourceAdapter> {
        &self.adapter
    }
}

impl fmt::Debug for RegisteredAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAdapter")
            .field("id", &self.id())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Read-only library → adapters mapping.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    libraries: BTreeMap<String, Vec<RegisteredAdapter>>,
}

impl AdapterRegistry {
    /// Start building a registry.
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// All adapters registered for `library`, ordered by priority.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownLibrary`] if the library is not registered.
    pub fn resolve(&self, library: &str) -> Result<&[RegisteredAdapter]> {
        self.libraries
            .get(&library.trim().to_lowercase())
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::UnknownLibrary(library.to_owned()))
    }

    /// Adapters for `library` that can serve `kind` with the language filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownLibrary`] if the library is not registered.
    pub fn relevant(
        &self,
        library: &str,
        kind: QueryKind,
        language: Option<&str>,
    ) -> Result<Vec<RegisteredAdapter>> {
        Ok(self
            .resolve(library)?
            .iter()
            .filter(|registered| registered.adapter.supports(kind, language))
            .cloned()
            .collect())
    }

    /// Whether `library` is registered (with or without adapters).
    pub fn contains(&self, library: &str) -> bool {
        self.libraries.contains_key(&library.trim().to_lowercase())
    }

    /// Registered library names, sorted.
    pub fn libraries(&self) -> Vec<String> {
        self.libraries.keys().cloned().collect()
    }

    /// Adapter id → priority for one library. Empty for unknown libraries.
    pub fn priorities(&self, library: &str) -> HashMap<String, u32> {
        self.resolve(library)
            .map(|adapters| {
                adapters
                    .iter()
                    .map(|r| (r.id().to_owned(), r.priority))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every adapter id across all libraries.
    pub fn adapter_ids(&self) -> Vec<String> {
        self.libraries
            .values()
            .flatten()
            .map(|r| r.id().to_owned())
            .collect()
    }
}

/// Accumulates registrations; validation happens in [`Self::build`].
#[derive(Default)]
pub struct AdapterRegistryBuilder {
    libraries: BTreeMap<String, Vec<RegisteredAdapter>>,
    errors: Vec<String>,
}

impl AdapterRegistryBuilder {
    /// Declare a library, possibly without any adapters.
    pub fn library(mut self, library: &str) -> Self {
        match normalise_library(library) {
            Some(name) => {
                self.libraries.entry(name).or_default();
            }
            None => self.errors.push("library name must not be empty".into()),
        }
        self
    }

    /// Register `adapter` for `library` with the given priority.
    pub fn register(
        mut self,
        library: &str,
        adapter: Arc<dyn SourceAdapter>,
        priority: u32,
    ) -> Self {
        let Some(name) = normalise_library(library) else {
            self.errors.push("library name must not be empty".into());
            return self;
        };
        let adapters = self.libraries.entry(name.clone()).or_default();
        if adapters.iter().any(|r| r.id() == adapter.id()) {
            self.errors.push(format!(
                "adapter {} registered twice for {name}",
                adapter.id()
            ));
            return self;
        }
        adapters.push(RegisteredAdapter { adapter, priority });
        self
    }

    /// Finish the registry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] listing every invalid registration.
    pub fn build(mut self) -> Result<AdapterRegistry> {
        if !self.errors.is_empty() {
            return Err(EngineError::Config(self.errors.join("; ")));
        }
        for adapters in self.libraries.values_mut() {
            // Stable: equal priorities keep registration order.
            adapters.sort_by_key(|r| r.priority);
        }
        Ok(AdapterRegistry {
            libraries: self.libraries,
        })
    }
}

fn normalise_library(library: &str) -> Option<String> {
    let name = library.trim().to_lowercase();
    (!name.is_empty()).then_some(name)
}
