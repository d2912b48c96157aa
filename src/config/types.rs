use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::batch::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::resolver::MAX_PAGES;
use crate::similarity::{Algorithm, MAX_DIFF};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub web_search: WebSearchConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Config {
    /// Enabled provider entries, in file order.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Result pages fetched per search pass
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Initial score to beat; candidates at or above it never match
    #[serde(default = "default_max_diff")]
    pub max_diff: f64,

    /// Abort on transient provider failures instead of treating them as misses
    #[serde(default)]
    pub strict: bool,

    /// Title distance algorithm
    #[serde(default)]
    pub algorithm: Algorithm,
}

fn default_max_pages() -> u32 {
    MAX_PAGES
}

fn default_max_diff() -> f64 {
    MAX_DIFF
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_diff: default_max_diff(),
            strict: false,
            algorithm: Algorithm::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum number of cached records
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Time to live of a cached record, in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_cache_ttl() -> u64 {
    DEFAULT_TTL.as_secs()
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Alternative search endpoint (defaults to DuckDuckGo's HTML endpoint)
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Resolutions in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for one title across all providers, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl BatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Supported provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Tmdb,
    Omdb,
}

impl ProviderKind {
    /// Environment variable that supplies a missing API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Tmdb => "TMDB_API_KEY",
            Self::Omdb => "OMDB_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tmdb => f.write_str("tmdb"),
            Self::Omdb => f.write_str("omdb"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: ProviderKind,

    #[serde(default)]
    pub api_key: String,

    /// Language tag detail records are requested in
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Alternative API root (mirrors, testing)
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_language() -> String {
    "en-US".to_string()
}

impl ProviderConfig {
    /// An enabled entry with default settings.
    pub fn new(name: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            name,
            api_key: api_key.into(),
            language: default_language(),
            enabled: true,
            base_url: None,
        }
    }
}
