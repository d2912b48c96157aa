//! TMDB (The Movie Database) provider adapter.
//!
//! Implements [`ProviderSearchClient`] and [`MetadataProvider`] by querying the
//! TMDB v3 REST API.
//!
//! Features:
//! - Token-bucket rate limiting (default 4 requests / second) via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - 30-second request timeout.
//! - Cross reference from IMDb and TVDB ids through `/find`.
//! - Failure classification: 429 after retries, 5xx and network errors are
//!   transient, 404 is not-found, anything else unexpected is malformed.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use crossid_common::{Candidate, MediaKind, ProviderError, ResultPage, SearchQuery};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::metadata::provider::{
    ImageInfo, MediaImages, MediaMetadata, MetadataProvider, ProviderSearchClient, Trailer,
    WebSearchScope,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Public TMDB v3 endpoint.
pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const DEFAULT_REQUESTS_PER_SECOND: u32 = 4;

const MOVIE_SCOPE: WebSearchScope = WebSearchScope {
    site: "themoviedb.org/movie/",
    id_start: "/movie/",
    id_end: "-",
};

const TV_SCOPE: WebSearchScope = WebSearchScope {
    site: "themoviedb.org/tv/",
    id_start: "/tv/",
    id_end: "-",
};

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
    total_pages: Option<u32>,
    total_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbFindResponse {
    #[serde(default)]
    movie_results: Vec<TmdbIdOnly>,
    #[serde(default)]
    tv_results: Vec<TmdbIdOnly>,
}

#[derive(Debug, Deserialize)]
struct TmdbIdOnly {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    title: Option<String>,
    original_title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    runtime: Option<u32>,
    genres: Option<Vec<TmdbGenre>>,
    imdb_id: Option<String>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    name: Option<String>,
    original_name: Option<String>,
    overview: Option<String>,
    first_air_date: Option<String>,
    vote_average: Option<f64>,
    episode_run_time: Option<Vec<u32>>,
    genres: Option<Vec<TmdbGenre>>,
    id: u64,
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TmdbImagesResponse {
    posters: Option<Vec<TmdbImage>>,
    backdrops: Option<Vec<TmdbImage>>,
    logos: Option<Vec<TmdbImage>>,
}

#[derive(Debug, Deserialize)]
struct TmdbImage {
    file_path: String,
    width: u32,
    height: u32,
    iso_639_1: Option<String>,
    vote_average: f64,
}

#[derive(Debug, Deserialize)]
struct TmdbVideosResponse {
    results: Vec<TmdbVideo>,
}

#[derive(Debug, Deserialize)]
struct TmdbVideo {
    name: String,
    site: String,
    key: String,
    #[serde(rename = "type")]
    video_type: Option<String>,
    iso_639_1: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// TMDB provider adapter.
///
/// # Examples
///
/// ```no_run
/// use crossid::metadata::providers::TmdbProvider;
///
/// let provider = TmdbProvider::new("your-api-key".into(), "en-US".into()).unwrap();
/// ```
pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl TmdbProvider {
    /// Create a new TMDB provider with the given API key and language.
    ///
    /// The `language` parameter should be a tag such as `"en-US"`.
    pub fn new(api_key: String, language: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build TMDB HTTP client")?;

        Ok(Self {
            client,
            api_key,
            language,
            base_url: TMDB_BASE_URL.to_string(),
            rate_limiter: rate_limiter(DEFAULT_REQUESTS_PER_SECOND),
        })
    }

    /// Point the provider at a different API root (mirrors, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Change the request rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limiter = rate_limiter(requests_per_second);
        self
    }

    /// Execute a GET request with rate limiting and 429-retry logic, then
    /// decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        extra_params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let mut params: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.as_str()),
            ("language", self.language.as_str()),
        ];
        params.extend(extra_params.iter().map(|(k, v)| (*k, v.as_str())));

        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;
            debug!(path, "TMDB request");

            let resp = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .map_err(|e| ProviderError::transient(format!("TMDB request failed: {path}: {e}")))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    retry = retries,
                    wait_secs = wait,
                    "TMDB returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if let Some(err) = classify_status(status, path) {
                return Err(err);
            }

            let body = resp
                .text()
                .await
                .map_err(|e| ProviderError::transient(format!("TMDB body read failed: {path}: {e}")))?;
            return serde_json::from_str(&body).map_err(|e| {
                ProviderError::malformed(format!("failed to parse TMDB response for {path}: {e}"))
            });
        }
    }
}

fn rate_limiter(requests_per_second: u32) -> DirectRateLimiter {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(per_second))
}

/// Map an HTTP status onto the provider failure taxonomy. `None` for success.
fn classify_status(status: StatusCode, path: &str) -> Option<ProviderError> {
    if status.is_success() {
        None
    } else if status == StatusCode::NOT_FOUND {
        Some(ProviderError::not_found(format!("TMDB has no resource at {path}")))
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        Some(ProviderError::transient(format!("TMDB returned {status} for {path}")))
    } else {
        Some(ProviderError::malformed(format!("TMDB returned {status} for {path}")))
    }
}

/// Extract a four-digit year from a date string like `"2023-04-15"`.
fn parse_year(date: &Option<String>) -> Option<u16> {
    date.as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<u16>().ok())
}

/// Convert a TMDB image path fragment to a full URL.
fn image_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

/// Convert a [`TmdbImage`] to an [`ImageInfo`].
fn to_image_info(img: &TmdbImage) -> ImageInfo {
    ImageInfo {
        url: image_url(&img.file_path),
        width: img.width,
        height: img.height,
        language: img.iso_639_1.clone(),
        vote_average: img.vote_average,
    }
}

fn into_page<T>(
    body: TmdbSearchResponse<T>,
    to_candidate: impl Fn(T) -> Candidate,
) -> ResultPage {
    ResultPage {
        candidates: body.results.into_iter().map(to_candidate).collect(),
        total_results: body.total_results,
        total_pages: body.total_pages,
    }
}

fn kind_path(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movie",
        MediaKind::Tv => "tv",
    }
}

#[async_trait]
impl ProviderSearchClient for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn is_valid_id(&self, id: &str) -> bool {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
    }

    async fn search(&self, query: &SearchQuery, page: u32) -> Result<ResultPage, ProviderError> {
        let mut params = vec![("query", query.title.clone()), ("page", page.to_string())];

        match query.kind {
            MediaKind::Movie => {
                if let Some(year) = query.year {
                    params.push(("year", year.to_string()));
                }
                let body: TmdbSearchResponse<TmdbMovieSearchResult> =
                    self.get_json("/search/movie", &params).await?;
                Ok(into_page(body, |r| Candidate {
                    id: r.id.to_string(),
                    title: r.title.unwrap_or_default(),
                    year: parse_year(&r.release_date),
                    original_title: r.original_title,
                }))
            }
            MediaKind::Tv => {
                if let Some(year) = query.year {
                    params.push(("first_air_date_year", year.to_string()));
                }
                let body: TmdbSearchResponse<TmdbTvSearchResult> =
                    self.get_json("/search/tv", &params).await?;
                Ok(into_page(body, |r| Candidate {
                    id: r.id.to_string(),
                    title: r.name.unwrap_or_default(),
                    year: parse_year(&r.first_air_date),
                    original_title: r.original_name,
                }))
            }
        }
    }

    fn cross_reference_sources(&self) -> &'static [&'static str] {
        &["imdb", "tvdb"]
    }

    async fn find_by_external_id(
        &self,
        source: &str,
        external_id: &str,
        kind: MediaKind,
    ) -> Result<Option<String>, ProviderError> {
        let external_source = match source {
            "imdb" => "imdb_id",
            "tvdb" => "tvdb_id",
            _ => return Ok(None),
        };

        let body: TmdbFindResponse = self
            .get_json(
                &format!("/find/{}", urlencoding::encode(external_id)),
                &[("external_source", external_source.to_string())],
            )
            .await?;

        let hits = match kind {
            MediaKind::Movie => body.movie_results,
            MediaKind::Tv => body.tv_results,
        };
        Ok(hits.first().map(|hit| hit.id.to_string()))
    }

    fn web_search_scope(&self, kind: MediaKind) -> Option<WebSearchScope> {
        Some(match kind {
            MediaKind::Movie => MOVIE_SCOPE,
            MediaKind::Tv => TV_SCOPE,
        })
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn language(&self) -> &str {
        &self.language
    }

    async fn get_metadata(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<MediaMetadata, ProviderError> {
        let mut provider_ids = HashMap::new();

        match kind {
            MediaKind::Movie => {
                let detail: TmdbMovieDetail =
                    self.get_json(&format!("/movie/{provider_id}"), &[]).await?;

                provider_ids.insert("tmdb".to_string(), detail.id.to_string());
                if let Some(imdb) = detail.imdb_id.filter(|id| !id.is_empty()) {
                    provider_ids.insert("imdb".to_string(), imdb);
                }

                Ok(MediaMetadata {
                    title: detail.title.unwrap_or_default(),
                    original_title: detail.original_title,
                    overview: detail.overview,
                    genres: detail
                        .genres
                        .unwrap_or_default()
                        .into_iter()
                        .map(|g| g.name)
                        .collect(),
                    production_year: parse_year(&detail.release_date),
                    premiere_date: detail.release_date,
                    community_rating: detail.vote_average,
                    runtime_minutes: detail.runtime,
                    provider_ids,
                })
            }
            MediaKind::Tv => {
                let detail: TmdbTvDetail = self
                    .get_json(
                        &format!("/tv/{provider_id}"),
                        &[("append_to_response", "external_ids".to_string())],
                    )
                    .await?;

                provider_ids.insert("tmdb".to_string(), detail.id.to_string());
                if let Some(ref ext) = detail.external_ids {
                    if let Some(ref imdb) = ext.imdb_id {
                        provider_ids.insert("imdb".to_string(), imdb.clone());
                    }
                    if let Some(tvdb) = ext.tvdb_id {
                        provider_ids.insert("tvdb".to_string(), tvdb.to_string());
                    }
                }

                let runtime = detail
                    .episode_run_time
                    .as_ref()
                    .and_then(|v| v.first().copied());

                Ok(MediaMetadata {
                    title: detail.name.unwrap_or_default(),
                    original_title: detail.original_name,
                    overview: detail.overview,
                    genres: detail
                        .genres
                        .unwrap_or_default()
                        .into_iter()
                        .map(|g| g.name)
                        .collect(),
                    production_year: parse_year(&detail.first_air_date),
                    premiere_date: detail.first_air_date,
                    community_rating: detail.vote_average,
                    runtime_minutes: runtime,
                    provider_ids,
                })
            }
        }
    }

    async fn get_images(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<MediaImages, ProviderError> {
        let path = format!("/{}/{provider_id}/images", kind_path(kind));
        let resp: TmdbImagesResponse = self.get_json(&path, &[]).await?;

        let convert = |images: Option<Vec<TmdbImage>>| -> Vec<ImageInfo> {
            images.unwrap_or_default().iter().map(to_image_info).collect()
        };

        Ok(MediaImages {
            posters: convert(resp.posters),
            backdrops: convert(resp.backdrops),
            logos: convert(resp.logos),
        })
    }

    async fn get_trailers(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<Vec<Trailer>, ProviderError> {
        let path = format!("/{}/{provider_id}/videos", kind_path(kind));
        let resp: TmdbVideosResponse = self.get_json(&path, &[]).await?;

        Ok(resp
            .results
            .into_iter()
            .filter(|v| matches!(v.video_type.as_deref(), Some("Trailer") | Some("Teaser")))
            .map(|v| Trailer::new(v.name, v.site, v.key, v.iso_639_1))
            .collect())
    }
}
