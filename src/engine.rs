//! Composition root: builds providers, cache, gateway and detail service from
//! a [`Config`].
//!
//! Nothing here is global. Every component receives its collaborators through
//! its constructor and the [`Engine`] owns them for the lifetime of a command.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::batch::BatchResolver;
use crate::cache::IdentityCache;
use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::metadata::providers::{OmdbProvider, TmdbProvider};
use crate::metadata::{CachedRecord, DetailService, MetadataProvider, ProviderRegistry};
use crate::resolver::{ExternalLookupGateway, FailurePolicy, TitleResolver};
use crate::websearch::DuckDuckGoSearch;

/// Fully wired resolution engine.
pub struct Engine {
    /// Enabled providers in config order.
    pub registry: Arc<ProviderRegistry>,
    /// Strategy chain shared by single and batch lookups.
    pub gateway: Arc<ExternalLookupGateway>,
    /// Cached detail fetches.
    pub details: DetailService,
    /// Record cache behind `details`.
    pub cache: Arc<IdentityCache<CachedRecord>>,
    config: Config,
}

impl Engine {
    /// Build every component described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = ProviderRegistry::new();
        for provider in config.enabled_providers() {
            registry.register(build_provider(provider)?);
        }
        Self::with_registry(config, registry)
    }

    /// Build the engine around an already populated registry.
    pub fn with_registry(config: &Config, registry: ProviderRegistry) -> Result<Self> {
        let policy = FailurePolicy::new(config.resolver.strict);
        let cache = Arc::new(IdentityCache::new(config.cache.capacity, config.cache.ttl()));

        let resolver = TitleResolver::new(policy)
            .with_scorer(config.resolver.algorithm.scorer())
            .with_max_pages(config.resolver.max_pages)
            .with_max_diff(config.resolver.max_diff);

        let mut gateway = ExternalLookupGateway::new(resolver).with_cache(cache.clone());
        if config.web_search.enabled {
            let search = match config.web_search.base_url.as_deref() {
                Some(base_url) => DuckDuckGoSearch::with_base_url(base_url),
                None => DuckDuckGoSearch::new(),
            }
            .context("Failed to create web search client")?;
            gateway = gateway.with_web_search(Arc::new(search));
        }

        info!(
            providers = registry.len(),
            available = registry.available().len(),
            strict = policy.is_strict(),
            web_search = config.web_search.enabled,
            "Resolution engine ready"
        );

        Ok(Self {
            registry: Arc::new(registry),
            gateway: Arc::new(gateway),
            details: DetailService::new(cache.clone(), policy),
            cache,
            config: config.clone(),
        })
    }

    /// Batch runner sharing this engine's registry and gateway.
    pub fn batch(&self) -> BatchResolver {
        BatchResolver::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.gateway),
            self.config.batch.concurrency,
            self.config.batch.timeout(),
        )
    }
}

fn build_provider(provider: &ProviderConfig) -> Result<Arc<dyn MetadataProvider>> {
    let built: Arc<dyn MetadataProvider> = match provider.name {
        ProviderKind::Tmdb => {
            let mut tmdb = TmdbProvider::new(provider.api_key.clone(), provider.language.clone())?;
            if let Some(base_url) = &provider.base_url {
                tmdb = tmdb.with_base_url(base_url);
            }
            Arc::new(tmdb)
        }
        ProviderKind::Omdb => {
            let mut omdb = OmdbProvider::new(provider.api_key.clone())?;
            if let Some(base_url) = &provider.base_url {
                omdb = omdb.with_base_url(base_url);
            }
            Arc::new(omdb)
        }
    };
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_configured_providers_in_order() {
        let config = Config {
            providers: vec![
                ProviderConfig::new(ProviderKind::Omdb, "omdb-key"),
                ProviderConfig::new(ProviderKind::Tmdb, "tmdb-key"),
            ],
            ..Config::default()
        };

        let engine = Engine::from_config(&config).unwrap();
        let names: Vec<&str> = engine.registry.available().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["imdb", "tmdb"]);
        assert_eq!(engine.cache.capacity(), 200);
    }

    #[test]
    fn disabled_providers_are_not_registered() {
        let mut disabled = ProviderConfig::new(ProviderKind::Tmdb, "key");
        disabled.enabled = false;
        let config = Config {
            providers: vec![disabled],
            ..Config::default()
        };

        let engine = Engine::from_config(&config).unwrap();
        assert!(engine.registry.is_empty());
    }

    #[test]
    fn resolver_settings_are_applied() {
        let mut config = Config::default();
        config.resolver.max_pages = 2;
        config.resolver.strict = true;
        config.web_search.enabled = false;

        let engine = Engine::from_config(&config).unwrap();
        assert!(engine.gateway.resolver().policy().is_strict());
    }
}
