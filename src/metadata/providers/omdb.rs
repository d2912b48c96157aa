//! OMDb (Open Movie Database) provider adapter.
//!
//! OMDb identifies titles by their IMDb id (`tt0499549`), so this adapter
//! registers under the name `imdb` and anything it resolves is directly usable
//! as a cross-reference source by other providers.
//!
//! OMDb always answers `200 OK`; failures are reported in the body as
//! `{"Response": "False", "Error": "..."}` and classified here.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use crossid_common::{Candidate, MediaKind, ProviderError, ResultPage, SearchQuery};
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::metadata::provider::{
    ImageInfo, MediaImages, MediaMetadata, MetadataProvider, ProviderSearchClient, Trailer,
    WebSearchScope,
};

/// Public OMDb endpoint.
pub const OMDB_BASE_URL: &str = "https://www.omdbapi.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RESULTS_PER_PAGE: u32 = 10;
const DEFAULT_REQUESTS_PER_SECOND: u32 = 4;

const IMDB_SCOPE: WebSearchScope = WebSearchScope {
    site: "imdb.com/title/",
    id_start: "/title/",
    id_end: "/",
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbEnvelope {
    response: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchResponse {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbSearchRow>,
    #[serde(rename = "totalResults")]
    total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchRow {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: String,
}

#[derive(Debug, Deserialize)]
struct OmdbTitle {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Released")]
    released: Option<String>,
    #[serde(rename = "Runtime")]
    runtime: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: String,
}

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// OMDb provider adapter.
pub struct OmdbProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl OmdbProvider {
    /// Create a new OMDb provider with the given API key.
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build OMDb HTTP client")?;

        let per_second = NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client,
            api_key,
            base_url: OMDB_BASE_URL.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Point the provider at a different API root (mirrors, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Issue one request and decode the body, turning `Response: "False"`
    /// into a classified error.
    async fn get_json<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T, ProviderError> {
        self.rate_limiter.until_ready().await;
        debug!(params = ?params, "OMDb request");

        let resp = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::transient(format!("OMDb request failed: {e}")))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ProviderError::transient(format!("OMDb returned {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::transient(format!("OMDb body read failed: {e}")))?;

        let envelope: OmdbEnvelope = serde_json::from_str(&body)
            .map_err(|e| ProviderError::malformed(format!("failed to parse OMDb response: {e}")))?;
        if !envelope.response.eq_ignore_ascii_case("true") {
            return Err(classify_error(envelope.error.as_deref().unwrap_or("unknown error")));
        }
        if !status.is_success() {
            return Err(ProviderError::malformed(format!("OMDb returned {status}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::malformed(format!("failed to parse OMDb response: {e}")))
    }
}

/// Map an OMDb error message onto the provider failure taxonomy.
fn classify_error(message: &str) -> ProviderError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not found") || lower.contains("incorrect imdb id") {
        ProviderError::not_found(message.to_string())
    } else if lower.contains("limit reached") || lower.contains("too many") {
        ProviderError::transient(message.to_string())
    } else {
        ProviderError::malformed(message.to_string())
    }
}

/// First four-digit year of `"2009"`, `"2003–2015"` or `"2019–"`.
fn parse_year(year: Option<&str>) -> Option<u16> {
    year.and_then(|y| y.get(..4)).and_then(|y| y.parse().ok())
}

/// OMDb uses the literal string `"N/A"` for missing values.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "N/A")
}

fn search_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movie",
        MediaKind::Tv => "series",
    }
}

#[async_trait]
impl ProviderSearchClient for OmdbProvider {
    fn name(&self) -> &'static str {
        "imdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn is_valid_id(&self, id: &str) -> bool {
        id.strip_prefix("tt")
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
    }

    async fn search(&self, query: &SearchQuery, page: u32) -> Result<ResultPage, ProviderError> {
        let mut params = vec![
            ("s", query.title.clone()),
            ("type", search_type(query.kind).to_string()),
            ("page", page.to_string()),
        ];
        if let Some(year) = query.year {
            params.push(("y", year.to_string()));
        }

        let body: OmdbSearchResponse = match self.get_json(&params).await {
            Ok(body) => body,
            Err(ProviderError::NotFound(_)) => return Ok(ResultPage::empty()),
            Err(err) => return Err(err),
        };

        let total_results = body.total_results.and_then(|t| t.parse::<u32>().ok());
        Ok(ResultPage {
            candidates: body
                .search
                .into_iter()
                .map(|row| Candidate::new(row.imdb_id, row.title, parse_year(row.year.as_deref())))
                .collect(),
            total_results,
            total_pages: total_results.map(|total| total.div_ceil(RESULTS_PER_PAGE)),
        })
    }

    fn web_search_scope(&self, _kind: MediaKind) -> Option<WebSearchScope> {
        Some(IMDB_SCOPE)
    }
}

#[async_trait]
impl MetadataProvider for OmdbProvider {
    fn language(&self) -> &str {
        "en"
    }

    async fn get_metadata(
        &self,
        provider_id: &str,
        _kind: MediaKind,
    ) -> Result<MediaMetadata, ProviderError> {
        let title: OmdbTitle = self
            .get_json(&[("i", provider_id.to_string()), ("plot", "short".to_string())])
            .await?;

        let mut provider_ids = HashMap::new();
        provider_ids.insert("imdb".to_string(), title.imdb_id.clone());

        Ok(MediaMetadata {
            production_year: parse_year(title.year.as_deref()),
            title: title.title,
            original_title: None,
            overview: present(title.plot),
            genres: present(title.genre)
                .map(|g| g.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            premiere_date: present(title.released),
            community_rating: present(title.imdb_rating).and_then(|r| r.parse().ok()),
            runtime_minutes: present(title.runtime)
                .and_then(|r| r.split_whitespace().next().and_then(|n| n.parse().ok())),
            provider_ids,
        })
    }

    async fn get_images(
        &self,
        provider_id: &str,
        _kind: MediaKind,
    ) -> Result<MediaImages, ProviderError> {
        let title: OmdbTitle = self.get_json(&[("i", provider_id.to_string())]).await?;

        Ok(MediaImages {
            posters: present(title.poster)
                .map(|url| ImageInfo {
                    url,
                    width: 0,
                    height: 0,
                    language: None,
                    vote_average: 0.0,
                })
                .into_iter()
                .collect(),
            ..MediaImages::default()
        })
    }

    async fn get_trailers(
        &self,
        _provider_id: &str,
        _kind: MediaKind,
    ) -> Result<Vec<Trailer>, ProviderError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer) -> OmdbProvider {
        OmdbProvider::new("test-key".into()).unwrap().with_base_url(server.uri())
    }

    #[test]
    fn id_validity() {
        let provider = OmdbProvider::new("key".into()).unwrap();
        assert_eq!(provider.name(), "imdb");
        assert!(provider.is_valid_id("tt0499549"));
        assert!(!provider.is_valid_id("tt"));
        assert!(!provider.is_valid_id("19995"));
        assert!(!provider.is_valid_id("tt04x"));
    }

    #[test]
    fn year_ranges() {
        assert_eq!(parse_year(Some("2009")), Some(2009));
        assert_eq!(parse_year(Some("2003–2015")), Some(2003));
        assert_eq!(parse_year(Some("N/A")), None);
        assert_eq!(parse_year(None), None);
    }

    #[test]
    fn error_messages_are_classified() {
        assert_matches!(classify_error("Movie not found!"), ProviderError::NotFound(_));
        assert_matches!(classify_error("Incorrect IMDb ID."), ProviderError::NotFound(_));
        assert_matches!(classify_error("Request limit reached!"), ProviderError::Transient(_));
        assert_matches!(classify_error("Invalid API key!"), ProviderError::Malformed(_));
    }

    #[tokio::test]
    async fn search_page_with_count_hint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("s", "Avatar"))
            .and(query_param("type", "movie"))
            .and(query_param("y", "2009"))
            .and(query_param("page", "1"))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Search": [
                    {"Title": "Avatar", "Year": "2009", "imdbID": "tt0499549", "Type": "movie"},
                    {"Title": "Avatar: Creating the World of Pandora", "Year": "2010", "imdbID": "tt1599280", "Type": "movie"}
                ],
                "totalResults": "23",
                "Response": "True"
            })))
            .mount(&server)
            .await;

        let query = SearchQuery {
            title: "Avatar".into(),
            year: Some(2009),
            kind: MediaKind::Movie,
        };
        let page = provider(&server).await.search(&query, 1).await.unwrap();

        assert_eq!(page.candidates[0], Candidate::new("tt0499549", "Avatar", Some(2009)));
        assert_eq!(page.total_results, Some(23));
        assert_eq!(page.total_pages, Some(3));
    }

    #[tokio::test]
    async fn not_found_is_an_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("type", "series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "False",
                "Error": "Series not found!"
            })))
            .mount(&server)
            .await;

        let query = SearchQuery {
            title: "Nope".into(),
            year: None,
            kind: MediaKind::Tv,
        };
        let page = provider(&server).await.search(&query, 1).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn request_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "Response": "False",
                "Error": "Request limit reached!"
            })))
            .mount(&server)
            .await;

        let query = SearchQuery {
            title: "Avatar".into(),
            year: None,
            kind: MediaKind::Movie,
        };
        let err = provider(&server).await.search(&query, 1).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn title_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("i", "tt0499549"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Title": "Avatar",
                "Year": "2009",
                "Released": "18 Dec 2009",
                "Runtime": "162 min",
                "Genre": "Action, Adventure, Fantasy",
                "Plot": "A paraplegic Marine dispatched to the moon Pandora...",
                "Poster": "https://m.media-amazon.com/images/M/avatar.jpg",
                "imdbRating": "7.9",
                "imdbID": "tt0499549",
                "Response": "True"
            })))
            .mount(&server)
            .await;

        let omdb = provider(&server).await;
        let metadata = omdb.get_metadata("tt0499549", MediaKind::Movie).await.unwrap();
        assert_eq!(metadata.production_year, Some(2009));
        assert_eq!(metadata.runtime_minutes, Some(162));
        assert_eq!(metadata.genres, vec!["Action", "Adventure", "Fantasy"]);
        assert_eq!(metadata.community_rating, Some(7.9));
        assert_eq!(metadata.provider_ids.get("imdb").map(String::as_str), Some("tt0499549"));

        let images = omdb.get_images("tt0499549", MediaKind::Movie).await.unwrap();
        assert_eq!(images.posters.len(), 1);
        assert!(images.backdrops.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "False",
                "Error": "Incorrect IMDb ID."
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .get_metadata("tt0", MediaKind::Movie)
            .await
            .unwrap_err();
        assert_matches!(err, ProviderError::NotFound(_));
    }
}
