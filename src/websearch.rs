//! Last-resort lookup through a generic web search engine.
//!
//! When a provider's own search finds nothing, its page can often still be
//! found with a `site:` query. The id is then cut out of the result URL
//! between two fixed markers (e.g. `/movie/` and `-` for
//! `https://www.themoviedb.org/movie/19995-avatar`).

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use crossid_common::ProviderError;
use regex::Regex;
use tracing::debug;

use crate::metadata::WebSearchScope;

/// Default HTML endpoint of DuckDuckGo.
pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("crossid/", env!("CARGO_PKG_VERSION"));

/// A web search engine returning result URLs in rank order.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    /// Run `query` and return result URLs, best first.
    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError>;
}

/// Build the search query for a provider scope: `site:<scope> <title> <year>`.
pub fn scoped_query(scope: &WebSearchScope, title: &str, year: Option<u16>) -> String {
    match year {
        Some(year) => format!("site:{} {} {year}", scope.site, title.trim()),
        None => format!("site:{} {}", scope.site, title.trim()),
    }
}

/// Extract the substring of `url` between `start` and `end`.
///
/// The id also stops at `/`, `?`, `#` or the end of the URL, whichever comes
/// first. Returns `None` when `start` is absent or the id would be empty.
pub fn extract_id_between<'a>(url: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let begin = url.find(start)? + start.len();
    let rest = &url[begin..];
    let mut stop = rest.len();
    if !end.is_empty() {
        if let Some(pos) = rest.find(end) {
            stop = stop.min(pos);
        }
    }
    if let Some(pos) = rest.find(['/', '?', '#']) {
        stop = stop.min(pos);
    }
    let id = &rest[..stop];
    (!id.is_empty()).then_some(id)
}

/// Pick the first URL within `scope` that yields an id accepted by
/// `is_valid`.
pub fn first_id_in<'a>(
    urls: &'a [String],
    scope: &WebSearchScope,
    is_valid: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    urls.iter()
        .filter(|url| url.contains(scope.site))
        .filter_map(|url| extract_id_between(url, scope.id_start, scope.id_end))
        .find(|id| is_valid(id))
}

// ---------------------------------------------------------------------------
// DuckDuckGo
// ---------------------------------------------------------------------------

/// [`WebSearchClient`] backed by DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    /// Create a client for the public endpoint.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DUCKDUCKGO_HTML_URL)
    }

    /// Create a client for an alternative endpoint (tests, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::malformed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl WebSearchClient for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        debug!(query, "Web search");
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ProviderError::transient(format!("web search request failed: {e}")))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ProviderError::transient(format!("web search returned {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::malformed(format!("web search returned {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::transient(format!("web search body read failed: {e}")))?;
        Ok(result_links(&body))
    }
}

fn result_anchor_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"<a\s[^>]*class="[^"]*result__a[^"]*"[^>]*>"#).ok())
        .as_ref()
}

fn href_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"href="([^"]+)""#).ok())
        .as_ref()
}

/// Pull result URLs out of a DuckDuckGo HTML result page, unwrapping its
/// redirect links.
fn result_links(html: &str) -> Vec<String> {
    let (Some(anchor), Some(href)) = (result_anchor_pattern(), href_pattern()) else {
        return Vec::new();
    };
    anchor
        .find_iter(html)
        .filter_map(|tag| href.captures(tag.as_str()))
        .filter_map(|caps| caps.get(1).map(|m| unwrap_redirect(m.as_str())))
        .collect()
}

fn unwrap_redirect(href: &str) -> String {
    let href = href.replace("&amp;", "&");
    if let Some(pos) = href.find("uddg=") {
        let encoded = href[pos + 5..].split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    href
}
