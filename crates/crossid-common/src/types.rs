//! Core type definitions for lookups, search queries and result pages.
//!
//! Everything here is transient: created for one resolution call and dropped
//! when it returns. Enums serialize in lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog a lookup targets. Providers keep movies and TV shows apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A feature film.
    Movie,
    /// A TV series.
    Tv,
}

impl MediaKind {
    /// Stable lowercase name, also used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" | "film" => Ok(Self::Movie),
            "tv" | "series" | "show" | "tvshow" | "tvshows" => Ok(Self::Tv),
            _ => Err(format!("Unknown media kind: {s}")),
        }
    }
}

/// What a caller wants resolved for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Localised display title. Must not be blank.
    pub title: String,
    /// Title in the original language, when the caller knows it.
    #[serde(default)]
    pub original_title: Option<String>,
    /// Release or first-air year.
    #[serde(default)]
    pub year: Option<u16>,
    /// Target catalog.
    pub kind: MediaKind,
}

impl LookupRequest {
    /// Create a request for `title` in the given catalog.
    pub fn new(title: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            title: title.into(),
            original_title: None,
            year: None,
            kind,
        }
    }

    /// Set the release year.
    #[must_use]
    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    /// Set the original-language title.
    #[must_use]
    pub fn with_original_title(mut self, original_title: impl Into<String>) -> Self {
        self.original_title = Some(original_title.into());
        self
    }

    /// Original title worth a separate search: present, non-blank and not
    /// equal to `title` ignoring case.
    pub fn distinct_original_title(&self) -> Option<&str> {
        self.original_title
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty() && o.to_lowercase() != self.title.trim().to_lowercase())
    }

    /// Search query for `title` scoped by this request's year and kind.
    pub fn query_for(&self, title: &str) -> SearchQuery {
        SearchQuery {
            title: title.to_string(),
            year: self.year,
            kind: self.kind,
        }
    }
}

/// One query as sent to a provider's search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    /// Title text to search for.
    pub title: String,
    /// Optional year constraint.
    pub year: Option<u16>,
    /// Target catalog.
    pub kind: MediaKind,
}

impl SearchQuery {
    /// Same query with the year constraint removed.
    #[must_use]
    pub fn without_year(&self) -> Self {
        Self {
            year: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} ({year}) [{}]", self.title, self.kind),
            None => write!(f, "{} [{}]", self.title, self.kind),
        }
    }
}

/// One search result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider-specific identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Original-language title, if the provider reports one.
    pub original_title: Option<String>,
    /// Release year; rows without a positive year are never scored.
    pub year: Option<u16>,
}

impl Candidate {
    /// Create a candidate without an original title.
    pub fn new(id: impl Into<String>, title: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            original_title: None,
            year,
        }
    }

    /// Set the original-language title.
    #[must_use]
    pub fn with_original_title(mut self, original_title: impl Into<String>) -> Self {
        self.original_title = Some(original_title.into());
        self
    }

    /// Returns `true` if the candidate carries a usable release year.
    pub fn has_year(&self) -> bool {
        self.year.is_some_and(|y| y > 0)
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
    /// Rows in provider ranking order.
    pub candidates: Vec<Candidate>,
    /// Total number of matching rows across all pages, if reported.
    pub total_results: Option<u32>,
    /// Total number of pages, if reported.
    pub total_pages: Option<u32>,
}

impl ResultPage {
    /// A page carrying no rows. Ends a paginated search.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Page with the given rows and no count hints.
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            total_results: None,
            total_pages: None,
        }
    }

    /// Attach a total-pages hint.
    #[must_use]
    pub fn with_total_pages(mut self, total_pages: u32) -> Self {
        self.total_pages = Some(total_pages);
        self
    }

    /// Returns `true` if the page has no rows.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Returns `true` when the count hint says `page` was the final page.
    pub fn is_last(&self, page: u32) -> bool {
        self.total_pages.is_some_and(|total| page >= total)
    }
}
