//! Strategy chain producing one provider id per entity.
//!
//! Strategies run cheapest first and the first success wins:
//!
//! 1. an id already known for the provider that passes its validity check
//! 2. a cross reference from another source's known id
//! 3. title search on the title (+ year)
//! 4. title search on a distinct original title (+ year)
//! 5. a best-effort web search scoped to the provider's site
//!
//! Every discovered id is written back into the caller's [`KnownIds`], so a
//! later call for the same entity stops at step 1.

use std::sync::Arc;

use crossid_common::{FailureKind, KnownIds, LookupRequest, MediaKind};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{cache_key, CacheLookup, CacheStore};
use crate::metadata::{CachedRecord, ProviderSearchClient};
use crate::websearch::{first_id_in, scoped_query, WebSearchClient};

use super::{FailurePolicy, ResolveError, TitleResolver};

/// Which strategy produced an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    KnownId,
    CrossReference,
    Title,
    OriginalTitle,
    WebSearch,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::KnownId => "known id",
            Self::CrossReference => "cross reference",
            Self::Title => "title",
            Self::OriginalTitle => "original title",
            Self::WebSearch => "web search",
        };
        f.write_str(name)
    }
}

/// Outcome of one gateway resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    /// Resolved id, `None` when every strategy came up empty.
    pub id: Option<String>,
    /// `true` for id-based strategies and perfect title matches.
    pub matched_exactly: bool,
    /// Strategy that produced the id.
    pub strategy: Option<Strategy>,
}

impl ResolutionResult {
    fn found(id: impl Into<String>, strategy: Strategy, matched_exactly: bool) -> Self {
        Self {
            id: Some(id.into()),
            matched_exactly,
            strategy: Some(strategy),
        }
    }

    fn not_found() -> Self {
        Self {
            id: None,
            matched_exactly: false,
            strategy: None,
        }
    }

    /// Returns `true` if an id was resolved.
    pub fn is_found(&self) -> bool {
        self.id.is_some()
    }
}

/// Cache key for a cross-reference answer.
fn cross_reference_key(source: &str, external_id: &str, kind: MediaKind, provider: &str) -> String {
    cache_key("xref", &format!("{source}###{external_id}###{kind}###{provider}"))
}

/// Runs the resolution strategies for one provider.
pub struct ExternalLookupGateway {
    resolver: TitleResolver,
    web_search: Option<Arc<dyn WebSearchClient>>,
    cache: Option<Arc<dyn CacheStore<CachedRecord>>>,
}

impl ExternalLookupGateway {
    /// Create a gateway around `resolver`, without web search or caching.
    pub fn new(resolver: TitleResolver) -> Self {
        Self {
            resolver,
            web_search: None,
            cache: None,
        }
    }

    /// Enable the web-search fallback.
    #[must_use]
    pub fn with_web_search(mut self, web_search: Arc<dyn WebSearchClient>) -> Self {
        self.web_search = Some(web_search);
        self
    }

    /// Memoize cross-reference answers in `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore<CachedRecord>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The title resolver used for steps 3 and 4.
    pub fn resolver(&self) -> &TitleResolver {
        &self.resolver
    }

    fn policy(&self) -> FailurePolicy {
        self.resolver.policy()
    }

    /// Resolve `request` to an id of `client`'s provider.
    ///
    /// `known_ids` is read for steps 1 and 2 and receives the discovered id
    /// under the provider's name. Entries for other sources are never touched.
    /// An entry under the provider's own name that fails
    /// [`is_valid_id`](ProviderSearchClient::is_valid_id) is ignored, and is
    /// replaced when a valid id is discovered; it is left as is on a miss.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidRequest`] for a blank title, and
    /// [`ResolveError::Unavailable`] when the policy is strict and a provider
    /// failed transiently.
    pub async fn resolve<C>(
        &self,
        client: &C,
        request: &LookupRequest,
        known_ids: &mut KnownIds,
    ) -> Result<ResolutionResult, ResolveError>
    where
        C: ProviderSearchClient + ?Sized,
    {
        if request.title.trim().is_empty() {
            return Err(ResolveError::InvalidRequest("title must not be blank".into()));
        }

        let provider = client.name();

        if let Some(id) = known_ids.get(provider) {
            if client.is_valid_id(id) {
                debug!(provider, id, "Using already known id");
                return Ok(ResolutionResult::found(id, Strategy::KnownId, true));
            }
            debug!(provider, id, "Ignoring known id that fails validation");
        }

        let result = self.run_strategies(client, request, known_ids).await?;

        match &result.id {
            Some(id) => {
                known_ids.insert(provider, id.clone());
                info!(
                    provider,
                    title = %request.title,
                    id = %id,
                    strategy = ?result.strategy,
                    exact = result.matched_exactly,
                    "Resolved"
                );
            }
            None => info!(provider, title = %request.title, "No id found"),
        }
        Ok(result)
    }

    async fn run_strategies<C>(
        &self,
        client: &C,
        request: &LookupRequest,
        known_ids: &KnownIds,
    ) -> Result<ResolutionResult, ResolveError>
    where
        C: ProviderSearchClient + ?Sized,
    {
        if let Some(id) = self.cross_reference(client, request.kind, known_ids).await? {
            return Ok(ResolutionResult::found(id, Strategy::CrossReference, true));
        }

        let by_title = self
            .resolver
            .resolve(client, &request.query_for(&request.title))
            .await?;
        if let Some(id) = by_title.id.clone() {
            return Ok(ResolutionResult::found(id, Strategy::Title, by_title.is_exact()));
        }

        if let Some(original) = request.distinct_original_title() {
            let by_original = self
                .resolver
                .resolve(client, &request.query_for(original))
                .await?;
            if let Some(id) = by_original.id.clone() {
                return Ok(ResolutionResult::found(
                    id,
                    Strategy::OriginalTitle,
                    by_original.is_exact(),
                ));
            }
        }

        if let Some(id) = self.web_search(client, request).await {
            return Ok(ResolutionResult::found(id, Strategy::WebSearch, false));
        }

        Ok(ResolutionResult::not_found())
    }

    /// Step 2: translate another source's known id.
    async fn cross_reference<C>(
        &self,
        client: &C,
        kind: MediaKind,
        known_ids: &KnownIds,
    ) -> Result<Option<String>, ResolveError>
    where
        C: ProviderSearchClient + ?Sized,
    {
        let provider = client.name();

        for &source in client.cross_reference_sources() {
            if source == provider {
                continue;
            }
            let Some(external_id) = known_ids.get(source) else {
                continue;
            };
            let key = cross_reference_key(source, external_id, kind, provider);

            if let Some(cache) = &self.cache {
                match cache.get(&key) {
                    CacheLookup::Hit(Some(CachedRecord::ExternalId(id))) if client.is_valid_id(&id) => {
                        debug!(provider, source, external_id, id = %id, "Cross reference from cache");
                        return Ok(Some(id));
                    }
                    CacheLookup::Hit(None) => {
                        debug!(provider, source, external_id, "Cached: no cross reference");
                        continue;
                    }
                    _ => {}
                }
            }

            match client.find_by_external_id(source, external_id, kind).await {
                Ok(found) => {
                    let found = found.filter(|id| client.is_valid_id(id));
                    self.remember(key, found.clone());
                    if let Some(id) = found {
                        debug!(provider, source, external_id, id = %id, "Cross reference hit");
                        return Ok(Some(id));
                    }
                }
                Err(err) => {
                    if err.kind() == FailureKind::NotFound {
                        self.remember(key, None);
                    }
                    self.policy().handle(provider, "cross reference", err)?;
                }
            }
        }

        Ok(None)
    }

    fn remember(&self, key: String, id: Option<String>) {
        if let Some(cache) = &self.cache {
            cache.put(key, id.map(CachedRecord::ExternalId));
        }
    }

    /// Step 5: scoped web search. Every failure is swallowed.
    async fn web_search<C>(&self, client: &C, request: &LookupRequest) -> Option<String>
    where
        C: ProviderSearchClient + ?Sized,
    {
        let search = self.web_search.as_ref()?;
        let scope = client.web_search_scope(request.kind)?;
        let query = scoped_query(&scope, &request.title, request.year);

        match search.search(&query).await {
            Ok(urls) => {
                let id = first_id_in(&urls, &scope, |id| client.is_valid_id(id)).map(str::to_string);
                if id.is_none() {
                    debug!(provider = client.name(), query = %query, results = urls.len(), "Web search found no usable link");
                }
                id
            }
            Err(err) => {
                debug!(provider = client.name(), query = %query, error = %err, "Web search failed");
                None
            }
        }
    }
}
