//! Registry of configured provider adapters.

use crate::backend::{Provider, ProviderAdapter};
use crate::error::ProviderError;
use std::collections::HashMap;
use std::sync::Arc;

/// Enum-keyed lookup of provider adapters.
///
/// Built once at startup; callers select an adapter by [`Provider`] and never
/// branch on provider identity beyond that.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registers an adapter under the provider it reports.
    ///
    /// A later registration for the same provider replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Registers an adapter, builder style.
    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Looks up the adapter for a provider.
    ///
    /// # Errors
    ///
    /// Returns an `Unavailable` error if the provider was not configured.
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| ProviderError::unavailable(provider))
    }

    /// Returns whether a provider is registered.
    #[must_use]
    pub fn contains(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Returns the registered providers in a stable order.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}
