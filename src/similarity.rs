//! Title distance functions.
//!
//! Every algorithm scores two titles after the same normalization pass
//! (lowercase, strip `, . ! ? " '`, collapse whitespace). Scores are
//! distances: lower is a better match and `0.0` means the normalized titles
//! are identical. A title that is blank after normalization scores
//! [`MAX_DIFF`] against anything.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel "no match at all" distance. Also the initial score-to-beat.
pub const MAX_DIFF: f64 = 1000.0;

const STRIPPED: [char; 6] = [',', '.', '!', '?', '"', '\''];

/// Normalize a title for comparison. Idempotent.
pub fn normalize(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A distance between two titles.
pub trait TitleDistance: Send + Sync + fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Distance between two already-normalized, non-blank strings.
    fn compare_normalized(&self, a: &str, b: &str) -> f64;

    /// Distance between two raw titles.
    fn distance(&self, a: &str, b: &str) -> f64 {
        let a = normalize(a);
        let b = normalize(b);
        if a.is_empty() || b.is_empty() {
            return MAX_DIFF;
        }
        self.compare_normalized(&a, &b).min(MAX_DIFF)
    }
}

/// Edit distance: number of single-character insertions, deletions and
/// substitutions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Levenshtein;

impl TitleDistance for Levenshtein {
    fn name(&self) -> &'static str {
        "levenshtein"
    }

    fn compare_normalized(&self, a: &str, b: &str) -> f64 {
        strsim::levenshtein(a, b) as f64
    }
}

/// `1 - jaro_winkler(a, b)`. Penalizes transpositions less than edits, which
/// suits person names and short titles.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl TitleDistance for JaroWinkler {
    fn name(&self) -> &'static str {
        "jaro_winkler"
    }

    fn compare_normalized(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 0.0;
        }
        (1.0 - strsim::jaro_winkler(a, b)).max(0.0)
    }
}

/// Configurable choice of distance algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Levenshtein,
    JaroWinkler,
}

impl Algorithm {
    /// Instantiate the scorer for this algorithm.
    pub fn scorer(self) -> Box<dyn TitleDistance> {
        match self {
            Self::Levenshtein => Box::new(Levenshtein),
            Self::JaroWinkler => Box::new(JaroWinkler),
        }
    }
}
