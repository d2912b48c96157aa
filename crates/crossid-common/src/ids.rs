//! Identifier bookkeeping shared between the engine and its callers.
//!
//! [`KnownIds`] maps a source name (`"tmdb"`, `"imdb"`, ...) to the identifier
//! that source uses for one entity. Callers own the map; the engine reads it
//! and appends newly discovered ids through `&mut` access only.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Source name to identifier mapping for a single entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownIds(BTreeMap<String, String>);

impl KnownIds {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier known for `source`, if any. Blank values count as absent.
    pub fn get(&self, source: &str) -> Option<&str> {
        self.0
            .get(source)
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// Returns `true` if a non-blank id is known for `source`.
    pub fn contains(&self, source: &str) -> bool {
        self.get(source).is_some()
    }

    /// Record `id` for `source`, replacing any previous value.
    ///
    /// Returns the previous id when it differed from the new one.
    pub fn insert(&mut self, source: impl Into<String>, id: impl Into<String>) -> Option<String> {
        let id = id.into();
        match self.0.insert(source.into(), id.clone()) {
            Some(previous) if previous != id => Some(previous),
            _ => None,
        }
    }

    /// Copy every entry of `other` that is not already known here.
    ///
    /// Existing ids win; returns the number of entries added.
    pub fn merge(&mut self, other: &KnownIds) -> usize {
        let mut added = 0;
        for (source, id) in other.iter() {
            if !self.contains(source) {
                self.0.insert(source.to_string(), id.to_string());
                added += 1;
            }
        }
        added
    }

    /// Iterate over `(source, id)` pairs in source-name order, skipping blanks.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(_, id)| !id.trim().is_empty())
            .map(|(source, id)| (source.as_str(), id.as_str()))
    }

    /// Number of non-blank entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` when no non-blank id is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KnownIds {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for KnownIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (source, id) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{source}={id}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_ids_are_absent() {
        let ids: KnownIds = [("tmdb", "  "), ("imdb", "tt0499549")].into_iter().collect();
        assert_eq!(ids.get("tmdb"), None);
        assert_eq!(ids.get("imdb"), Some("tt0499549"));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_insert_reports_changed_value() {
        let mut ids = KnownIds::new();
        assert_eq!(ids.insert("tmdb", "19995"), None);
        assert_eq!(ids.insert("tmdb", "19995"), None);
        assert_eq!(ids.insert("tmdb", "846"), Some("19995".to_string()));
        assert_eq!(ids.get("tmdb"), Some("846"));
    }

    #[test]
    fn test_merge_keeps_existing() {
        let mut ids: KnownIds = [("tmdb", "846")].into_iter().collect();
        let other: KnownIds = [("tmdb", "1"), ("imdb", "tt0499549")].into_iter().collect();

        assert_eq!(ids.merge(&other), 1);
        assert_eq!(ids.get("tmdb"), Some("846"));
        assert_eq!(ids.get("imdb"), Some("tt0499549"));
    }

    #[test]
    fn test_display() {
        let ids: KnownIds = [("tmdb", "846"), ("imdb", "tt0499549")].into_iter().collect();
        assert_eq!(ids.to_string(), "imdb=tt0499549, tmdb=846");
    }
}
