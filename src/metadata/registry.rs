//! Provider registry for managing multiple [`MetadataProvider`] implementations.
//!
//! The [`ProviderRegistry`] holds the configured adapters in registration order
//! and resolves one entity against every available provider, sharing a single
//! [`KnownIds`] map so ids discovered by one provider can be cross-referenced by
//! the next.

use std::sync::Arc;

use crossid_common::{KnownIds, LookupRequest};
use serde::Serialize;
use tracing::debug;

use super::provider::MetadataProvider;
use crate::resolver::{ExternalLookupGateway, ResolutionResult, ResolveError};

/// Resolution outcome for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResolution {
    /// Provider name.
    pub provider: &'static str,
    /// What the gateway found.
    #[serde(flatten)]
    pub result: ResolutionResult,
}

/// A registry that manages multiple [`MetadataProvider`] implementations.
///
/// Providers are stored in registration order, which is also the order
/// [`resolve_all`](Self::resolve_all) visits them in.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use crossid::metadata::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(my_provider));
///
/// let results = registry.resolve_all(&gateway, &request, &mut known_ids).await?;
/// ```
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a new metadata provider.
    ///
    /// Providers are stored in the order they are registered, which is the
    /// order [`resolve_all`](Self::resolve_all) visits them in.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    /// Number of registered providers, available or not.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Return references to all providers that are currently available
    /// (i.e. configured with valid credentials).
    pub fn available(&self) -> Vec<&dyn MetadataProvider> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.as_ref())
            .collect()
    }

    /// Look up a provider by its [`name`](super::ProviderSearchClient::name).
    ///
    /// Returns `None` if no provider with the given name has been registered.
    pub fn get(&self, name: &str) -> Option<&dyn MetadataProvider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// Resolve `request` against every available provider in registration
    /// order.
    ///
    /// All providers share `known_ids`: an IMDb id found by one provider lets a
    /// later one cross-reference instead of searching.
    ///
    /// # Errors
    ///
    /// Stops at the first [`ResolveError`] (a strict-mode transient failure or
    /// an invalid request).
    pub async fn resolve_all(
        &self,
        gateway: &ExternalLookupGateway,
        request: &LookupRequest,
        known_ids: &mut KnownIds,
    ) -> Result<Vec<ProviderResolution>, ResolveError> {
        let mut resolutions = Vec::new();

        for provider in self.available() {
            let result = gateway.resolve(provider, request, known_ids).await?;
            debug!(provider = provider.name(), found = result.is_found(), "Provider resolution finished");
            resolutions.push(ProviderResolution {
                provider: provider.name(),
                result,
            });
        }

        Ok(resolutions)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
