//! Trait definitions and types for metadata providers.
//!
//! This module defines the [`ProviderSearchClient`] trait, the narrow contract
//! the resolution engine drives, and [`MetadataProvider`], which adds the
//! detail lookups (metadata, artwork, trailers) performed once an id is known.
//! Adapters classify their failures into [`ProviderError`] before returning,
//! so nothing above this boundary looks at HTTP status codes.

use std::collections::HashMap;

use async_trait::async_trait;
use crossid_common::{MediaKind, ProviderError, ResultPage, SearchQuery};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Rich metadata for a movie or TV show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Localised title.
    pub title: String,
    /// Original-language title, if different from `title`.
    pub original_title: Option<String>,
    /// Synopsis / overview text.
    pub overview: Option<String>,
    /// Genre labels (e.g. "Action", "Drama").
    pub genres: Vec<String>,
    /// Year the media was first released or premiered.
    pub production_year: Option<u16>,
    /// Exact premiere / release date as an ISO-8601 string (YYYY-MM-DD).
    pub premiere_date: Option<String>,
    /// Community / audience rating (typically 0.0 - 10.0).
    pub community_rating: Option<f64>,
    /// Runtime in minutes, if known.
    pub runtime_minutes: Option<u32>,
    /// Map of external provider IDs keyed by provider name
    /// (e.g. `{"tmdb": "12345", "imdb": "tt1234567"}`).
    pub provider_ids: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Collection of images associated with a movie or TV show.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaImages {
    /// Poster artwork.
    pub posters: Vec<ImageInfo>,
    /// Backdrop / fanart images.
    pub backdrops: Vec<ImageInfo>,
    /// Logo / clear-logo images.
    pub logos: Vec<ImageInfo>,
}

impl MediaImages {
    /// Highest-voted poster, if any.
    pub fn best_poster(&self) -> Option<&ImageInfo> {
        best_by_vote(&self.posters)
    }

    /// Highest-voted backdrop, if any.
    pub fn best_backdrop(&self) -> Option<&ImageInfo> {
        best_by_vote(&self.backdrops)
    }

    /// Returns `true` if no artwork of any type is present.
    pub fn is_empty(&self) -> bool {
        self.posters.is_empty() && self.backdrops.is_empty() && self.logos.is_empty()
    }
}

fn best_by_vote(images: &[ImageInfo]) -> Option<&ImageInfo> {
    images.iter().max_by(|a, b| {
        a.vote_average
            .partial_cmp(&b.vote_average)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// A single image with sizing and quality metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Fully-qualified URL to the image.
    pub url: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// ISO-639-1 language code for the image content, if applicable.
    pub language: Option<String>,
    /// Community vote average for this image (higher is better).
    pub vote_average: f64,
}

// ---------------------------------------------------------------------------
// Trailers
// ---------------------------------------------------------------------------

/// A trailer or teaser hosted on a video site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trailer {
    /// Display name.
    pub name: String,
    /// Hosting site (e.g. "YouTube").
    pub site: String,
    /// Site-specific video key.
    pub key: String,
    /// Watch URL, when the site is known.
    pub url: Option<String>,
    /// ISO-639-1 language of the audio track.
    pub language: Option<String>,
}

impl Trailer {
    /// Build a trailer, deriving the watch URL for known sites.
    pub fn new(name: String, site: String, key: String, language: Option<String>) -> Self {
        let url = match site.to_ascii_lowercase().as_str() {
            "youtube" => Some(format!("https://www.youtube.com/watch?v={key}")),
            "vimeo" => Some(format!("https://vimeo.com/{key}")),
            _ => None,
        };
        Self {
            name,
            site,
            key,
            url,
            language,
        }
    }
}

// ---------------------------------------------------------------------------
// Cached records
// ---------------------------------------------------------------------------

/// Everything the identity cache stores, so one store serves every lookup
/// kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedRecord {
    Metadata(MediaMetadata),
    Images(MediaImages),
    Trailers(Vec<Trailer>),
    /// Provider id obtained through a cross reference.
    ExternalId(String),
}

// ---------------------------------------------------------------------------
// Web search scope
// ---------------------------------------------------------------------------

/// How to find a provider page through a generic web search engine and pull
/// the id out of its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSearchScope {
    /// Domain path the search is restricted to (`site:` operator).
    pub site: &'static str,
    /// Marker immediately preceding the id in a result URL.
    pub id_start: &'static str,
    /// Marker immediately following the id. The id also ends at `/`, `?`, `#`
    /// or the end of the URL.
    pub id_end: &'static str,
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

/// Search side of a provider: the contract the title resolver consumes.
#[async_trait]
pub trait ProviderSearchClient: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`). Also the
    /// key under which its ids are stored in [`KnownIds`](crossid_common::KnownIds).
    fn name(&self) -> &'static str;

    /// Returns `true` when the provider has been configured with valid
    /// credentials and is ready to serve requests.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether `id` is syntactically a valid identifier for this provider.
    fn is_valid_id(&self, id: &str) -> bool {
        !id.trim().is_empty()
    }

    /// Fetch one page (1-based) of results for `query`.
    ///
    /// A page with no rows means there are no more results.
    async fn search(&self, query: &SearchQuery, page: u32) -> Result<ResultPage, ProviderError>;

    /// Sources whose ids this provider can translate directly.
    fn cross_reference_sources(&self) -> &'static [&'static str] {
        &[]
    }

    /// Translate another source's id into this provider's id.
    ///
    /// `Ok(None)` means the provider knows no mapping.
    async fn find_by_external_id(
        &self,
        _source: &str,
        _external_id: &str,
        _kind: MediaKind,
    ) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }

    /// Web-search fallback scope, if this provider supports one.
    fn web_search_scope(&self, _kind: MediaKind) -> Option<WebSearchScope> {
        None
    }
}

/// A provider that can also fetch detail records for a resolved id.
///
/// Providers are expected to be cheaply cloneable or wrapped in an `Arc` so
/// they can be shared across tasks.
#[async_trait]
pub trait MetadataProvider: ProviderSearchClient {
    /// Language tag detail records are requested in (e.g. `"en-US"`).
    fn language(&self) -> &str;

    /// Fetch full metadata for the item identified by `provider_id`.
    async fn get_metadata(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<MediaMetadata, ProviderError>;

    /// Fetch available artwork for the item identified by `provider_id`.
    async fn get_images(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<MediaImages, ProviderError>;

    /// Fetch trailers for the item identified by `provider_id`.
    async fn get_trailers(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<Vec<Trailer>, ProviderError>;
}
