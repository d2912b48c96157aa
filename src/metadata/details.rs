//! Detail lookups for a resolved id.
//!
//! The [`DetailService`] fetches metadata, artwork and trailers from a
//! [`MetadataProvider`] through the shared identity cache. Keys are qualified by
//! provider and media kind, and metadata and trailers also by language:
//!
//! | record   | key                                        |
//! |----------|--------------------------------------------|
//! | metadata | `tmdb-movie###19995###en-US`               |
//! | images   | `tmdb-movie-images###19995`                |
//! | trailers | `tmdb-movie-trailers###19995###en-US`      |
//!
//! A `NotFound` answer is cached as an empty entry so it is not asked again.

use std::future::Future;
use std::sync::Arc;

use crossid_common::{FailureKind, KnownIds, MediaKind, ProviderError};
use serde::Serialize;
use tracing::{debug, info};

use super::provider::{CachedRecord, MediaImages, MediaMetadata, MetadataProvider, Trailer};
use crate::cache::{cache_key, localized_cache_key, CacheLookup, CacheStore};
use crate::resolver::{FailurePolicy, ResolveError};

/// Everything known about one resolved item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaDetails {
    /// Provider the records came from.
    pub provider: &'static str,
    /// Provider id.
    pub id: String,
    /// `None` when the provider has no record or a lenient fetch failed.
    pub metadata: Option<MediaMetadata>,
    /// `None` under the same conditions as `metadata`.
    pub images: Option<MediaImages>,
    /// Trailers and teasers. Empty when unavailable.
    pub trailers: Vec<Trailer>,
}

/// Cached access to provider detail records.
pub struct DetailService {
    cache: Arc<dyn CacheStore<CachedRecord>>,
    policy: FailurePolicy,
}

impl DetailService {
    /// Create a service storing records in `cache`.
    pub fn new(cache: Arc<dyn CacheStore<CachedRecord>>, policy: FailurePolicy) -> Self {
        Self { cache, policy }
    }

    /// Fetch metadata for `id`, merging the provider ids it reports into
    /// `known_ids`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Unavailable`] in strict mode on a transient failure.
    pub async fn metadata<P>(
        &self,
        provider: &P,
        id: &str,
        kind: MediaKind,
        known_ids: &mut KnownIds,
    ) -> Result<Option<MediaMetadata>, ResolveError>
    where
        P: MetadataProvider + ?Sized,
    {
        let key = localized_cache_key(&entity(provider.name(), kind, None), id, provider.language());
        let metadata = self
            .cached(
                provider.name(),
                "metadata",
                key,
                || provider.get_metadata(id, kind),
                CachedRecord::Metadata,
                |record| match record {
                    CachedRecord::Metadata(metadata) => Some(metadata),
                    _ => None,
                },
            )
            .await?;

        if let Some(metadata) = &metadata {
            let reported: KnownIds = metadata
                .provider_ids
                .iter()
                .map(|(source, id)| (source.as_str(), id.as_str()))
                .collect();
            let added = known_ids.merge(&reported);
            if added > 0 {
                debug!(provider = provider.name(), id, added, "Learned provider ids from metadata");
            }
        }
        Ok(metadata)
    }

    /// Fetch artwork for `id`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Unavailable`] in strict mode on a transient failure.
    pub async fn images<P>(
        &self,
        provider: &P,
        id: &str,
        kind: MediaKind,
    ) -> Result<Option<MediaImages>, ResolveError>
    where
        P: MetadataProvider + ?Sized,
    {
        let key = cache_key(&entity(provider.name(), kind, Some("images")), id);
        self.cached(
            provider.name(),
            "images",
            key,
            || provider.get_images(id, kind),
            CachedRecord::Images,
            |record| match record {
                CachedRecord::Images(images) => Some(images),
                _ => None,
            },
        )
        .await
    }

    /// Fetch trailers for `id`. An unknown id yields no trailers.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Unavailable`] in strict mode on a transient failure.
    pub async fn trailers<P>(
        &self,
        provider: &P,
        id: &str,
        kind: MediaKind,
    ) -> Result<Vec<Trailer>, ResolveError>
    where
        P: MetadataProvider + ?Sized,
    {
        let key = localized_cache_key(
            &entity(provider.name(), kind, Some("trailers")),
            id,
            provider.language(),
        );
        let trailers = self
            .cached(
                provider.name(),
                "trailers",
                key,
                || provider.get_trailers(id, kind),
                CachedRecord::Trailers,
                |record| match record {
                    CachedRecord::Trailers(trailers) => Some(trailers),
                    _ => None,
                },
            )
            .await?;
        Ok(trailers.unwrap_or_default())
    }

    /// Fetch metadata, artwork and trailers for `id`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Unavailable`] in strict mode on a transient failure.
    pub async fn fetch_all<P>(
        &self,
        provider: &P,
        id: &str,
        kind: MediaKind,
        known_ids: &mut KnownIds,
    ) -> Result<MediaDetails, ResolveError>
    where
        P: MetadataProvider + ?Sized,
    {
        let metadata = self.metadata(provider, id, kind, known_ids).await?;
        let images = self.images(provider, id, kind).await?;
        let trailers = self.trailers(provider, id, kind).await?;

        info!(
            provider = provider.name(),
            id,
            has_metadata = metadata.is_some(),
            trailers = trailers.len(),
            "Fetched details"
        );

        Ok(MediaDetails {
            provider: provider.name(),
            id: id.to_string(),
            metadata,
            images,
            trailers,
        })
    }

    /// Serve `key` from the cache or call `fetch` and remember the answer.
    async fn cached<T, F, Fut>(
        &self,
        provider: &str,
        operation: &'static str,
        key: String,
        fetch: F,
        wrap: fn(T) -> CachedRecord,
        unwrap: fn(CachedRecord) -> Option<T>,
    ) -> Result<Option<T>, ResolveError>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        match self.cache.get(&key) {
            CacheLookup::Hit(None) => {
                debug!(key = %key, "Cache hit (no record)");
                return Ok(None);
            }
            CacheLookup::Hit(Some(record)) => {
                if let Some(value) = unwrap(record) {
                    debug!(key = %key, "Cache hit");
                    return Ok(Some(value));
                }
            }
            CacheLookup::Miss => {}
        }

        match fetch().await {
            Ok(value) => {
                self.cache.put(key, Some(wrap(value.clone())));
                Ok(Some(value))
            }
            Err(err) => {
                let confirmed_missing = err.kind() == FailureKind::NotFound;
                self.policy.handle(provider, operation, err)?;
                if confirmed_missing {
                    self.cache.put(key, None);
                }
                Ok(None)
            }
        }
    }
}

fn entity(provider: &str, kind: MediaKind, record: Option<&str>) -> String {
    match record {
        Some(record) => format!("{provider}-{kind}-{record}"),
        None => format!("{provider}-{kind}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::IdentityCache;
    use crate::metadata::provider::ProviderSearchClient;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use crossid_common::{ResultPage, SearchQuery};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct StubProvider {
        metadata: Result<MediaMetadata, ProviderError>,
        calls: Mutex<HashMap<&'static str, u32>>,
    }

    impl StubProvider {
        fn new(metadata: Result<MediaMetadata, ProviderError>) -> Self {
            Self {
                metadata,
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn record(&self, call: &'static str) {
            *self.calls.lock().entry(call).or_default() += 1;
        }

        fn calls(&self, call: &str) -> u32 {
            self.calls.lock().get(call).copied().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ProviderSearchClient for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn search(&self, _query: &SearchQuery, _page: u32) -> Result<ResultPage, ProviderError> {
            Ok(ResultPage::empty())
        }
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        fn language(&self) -> &str {
            "it-IT"
        }

        async fn get_metadata(&self, _id: &str, _kind: MediaKind) -> Result<MediaMetadata, ProviderError> {
            self.record("metadata");
            self.metadata.clone()
        }

        async fn get_images(&self, _id: &str, _kind: MediaKind) -> Result<MediaImages, ProviderError> {
            self.record("images");
            Ok(MediaImages::default())
        }

        async fn get_trailers(&self, id: &str, _kind: MediaKind) -> Result<Vec<Trailer>, ProviderError> {
            self.record("trailers");
            Ok(vec![Trailer::new("Trailer".into(), "YouTube".into(), id.into(), Some("it".into()))])
        }
    }

    fn metadata() -> MediaMetadata {
        MediaMetadata {
            title: "La vita è bella".into(),
            original_title: None,
            overview: None,
            genres: vec!["Commedia".into()],
            production_year: Some(1997),
            premiere_date: Some("1997-12-20".into()),
            community_rating: Some(8.5),
            runtime_minutes: Some(116),
            provider_ids: [("stub".to_string(), "637".to_string()), ("imdb".to_string(), "tt0118799".to_string())]
                .into_iter()
                .collect(),
        }
    }

    fn service(policy: FailurePolicy) -> (DetailService, Arc<IdentityCache<CachedRecord>>) {
        let cache = Arc::new(IdentityCache::default());
        (DetailService::new(cache.clone(), policy), cache)
    }

    #[tokio::test]
    async fn metadata_is_cached_per_language() {
        let (service, cache) = service(FailurePolicy::lenient());
        let provider = StubProvider::new(Ok(metadata()));
        let mut known = KnownIds::new();

        for _ in 0..3 {
            let found = service.metadata(&provider, "637", MediaKind::Movie, &mut known).await.unwrap();
            assert_eq!(found.unwrap().title, "La vita è bella");
        }

        assert_eq!(provider.calls("metadata"), 1);
        assert!(cache.get("stub-movie###637###it-IT").is_hit());
    }

    #[tokio::test]
    async fn metadata_merges_reported_ids() {
        let (service, _) = service(FailurePolicy::lenient());
        let provider = StubProvider::new(Ok(metadata()));
        let mut known: KnownIds = [("imdb", "tt-already-known")].into_iter().collect();

        service.metadata(&provider, "637", MediaKind::Movie, &mut known).await.unwrap();

        assert_eq!(known.get("stub"), Some("637"));
        assert_eq!(known.get("imdb"), Some("tt-already-known"));
    }

    #[tokio::test]
    async fn not_found_is_remembered() {
        let (service, cache) = service(FailurePolicy::strict());
        let provider = StubProvider::new(Err(ProviderError::not_found("movie 0")));
        let mut known = KnownIds::new();

        for _ in 0..2 {
            let found = service.metadata(&provider, "0", MediaKind::Movie, &mut known).await.unwrap();
            assert!(found.is_none());
        }

        assert_eq!(provider.calls("metadata"), 1);
        assert_eq!(cache.get("stub-movie###0###it-IT"), CacheLookup::Hit(None));
    }

    #[tokio::test]
    async fn transient_failure_is_not_cached() {
        let (service, cache) = service(FailurePolicy::lenient());
        let provider = StubProvider::new(Err(ProviderError::transient("503")));
        let mut known = KnownIds::new();

        let found = service.metadata(&provider, "637", MediaKind::Tv, &mut known).await.unwrap();

        assert!(found.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn strict_transient_failure_propagates() {
        let (service, _) = service(FailurePolicy::strict());
        let provider = StubProvider::new(Err(ProviderError::transient("timeout")));

        let err = service
            .fetch_all(&provider, "637", MediaKind::Movie, &mut KnownIds::new())
            .await
            .unwrap_err();
        assert_matches!(err, ResolveError::Unavailable { operation: "metadata", .. });
        assert_eq!(provider.calls("images"), 0);
    }

    #[tokio::test]
    async fn fetch_all_uses_distinct_keys() {
        let (service, cache) = service(FailurePolicy::lenient());
        let provider = StubProvider::new(Ok(metadata()));

        let details = service
            .fetch_all(&provider, "637", MediaKind::Movie, &mut KnownIds::new())
            .await
            .unwrap();
        service
            .fetch_all(&provider, "637", MediaKind::Movie, &mut KnownIds::new())
            .await
            .unwrap();

        assert_eq!(details.provider, "stub");
        assert_eq!(details.trailers.len(), 1);
        assert_eq!(cache.len(), 3);
        assert!(cache.get("stub-movie-images###637").is_hit());
        assert!(cache.get("stub-movie-trailers###637###it-IT").is_hit());
        assert_eq!(provider.calls("trailers"), 1);
    }

    #[test]
    fn movie_and_tv_keys_do_not_collide() {
        assert_ne!(
            entity("tmdb", MediaKind::Movie, None),
            entity("tmdb", MediaKind::Tv, None)
        );
        assert_eq!(entity("tmdb", MediaKind::Tv, Some("images")), "tmdb-tv-images");
    }
}
