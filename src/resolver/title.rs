//! Staged, score-bounded title search.
//!
//! [`TitleResolver`] walks up to `max_pages` result pages for a query, scores
//! every candidate against the query title and keeps the single best one. A
//! candidate only replaces the running best when its distance is strictly
//! lower (the score to beat), a distance of `0` ends the search at once, and an
//! empty page ends it too. When a year was given and no perfect match turned
//! up, one more pass runs without the year and is kept only if it beats the
//! year-scoped result.

use crossid_common::{Candidate, SearchQuery};
use tracing::{debug, info};

use crate::metadata::ProviderSearchClient;
use crate::similarity::{normalize, Levenshtein, TitleDistance, MAX_DIFF};

use super::{FailurePolicy, ResolveError};

/// Default maximum number of result pages fetched per pass.
pub const MAX_PAGES: u32 = 5;

/// Best candidate found by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleMatch {
    /// Winning candidate id, `None` if nothing beat the threshold.
    pub id: Option<String>,
    /// Distance of the winner (the threshold itself when there is none).
    pub score: f64,
}

impl TitleMatch {
    fn none(score: f64) -> Self {
        Self { id: None, score }
    }

    /// Returns `true` for a candidate whose normalized title equals the query.
    pub fn is_exact(&self) -> bool {
        self.id.is_some() && self.score == 0.0
    }
}

/// Finds the best-matching candidate id for a title against a paginated
/// provider.
#[derive(Debug)]
pub struct TitleResolver {
    scorer: Box<dyn TitleDistance>,
    max_pages: u32,
    max_diff: f64,
    policy: FailurePolicy,
}

impl TitleResolver {
    /// Create a resolver using Levenshtein distance, [`MAX_PAGES`] pages and
    /// [`MAX_DIFF`] as the initial score to beat.
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            scorer: Box::new(Levenshtein),
            max_pages: MAX_PAGES,
            max_diff: MAX_DIFF,
            policy,
        }
    }

    /// Use a different distance algorithm.
    #[must_use]
    pub fn with_scorer(mut self, scorer: Box<dyn TitleDistance>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Cap the number of pages fetched per pass (minimum 1).
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Initial score to beat, clamped to `(0, MAX_DIFF]`. Candidates scoring
    /// this or worse never match.
    #[must_use]
    pub fn with_max_diff(mut self, max_diff: f64) -> Self {
        self.max_diff = if max_diff.is_nan() || max_diff <= 0.0 {
            MAX_DIFF
        } else {
            max_diff.min(MAX_DIFF)
        };
        self
    }

    /// Failure policy applied to page fetch errors.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Resolve `query` against `client`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unavailable`] only when the policy is strict
    /// and a page fetch failed transiently.
    pub async fn resolve<C>(&self, client: &C, query: &SearchQuery) -> Result<TitleMatch, ResolveError>
    where
        C: ProviderSearchClient + ?Sized,
    {
        if normalize(&query.title).is_empty() {
            debug!(provider = client.name(), query = %query, "Blank title after normalization; skipping search");
            return Ok(TitleMatch::none(self.max_diff));
        }

        let scoped = self.search_pass(client, query, self.max_diff).await?;

        let result = if query.year.is_some() && scoped.score > 0.0 {
            let relaxed_query = query.without_year();
            debug!(
                provider = client.name(),
                query = %relaxed_query,
                score_to_beat = scoped.score,
                "No perfect match with year; retrying without it"
            );
            let relaxed = self
                .search_pass(client, &relaxed_query, scoped.score)
                .await?;
            if relaxed.id.is_some() {
                relaxed
            } else {
                scoped
            }
        } else {
            scoped
        };

        info!(
            provider = client.name(),
            query = %query,
            id = ?result.id,
            score = result.score,
            "Title search finished"
        );
        Ok(result)
    }

    /// One pass over up to `max_pages` pages, accepting only candidates that
    /// score strictly below `score_to_beat`.
    async fn search_pass<C>(
        &self,
        client: &C,
        query: &SearchQuery,
        score_to_beat: f64,
    ) -> Result<TitleMatch, ResolveError>
    where
        C: ProviderSearchClient + ?Sized,
    {
        let mut best = TitleMatch::none(score_to_beat);

        for page in 1..=self.max_pages {
            let results = match client.search(query, page).await {
                Ok(results) => results,
                Err(err) => {
                    self.policy.handle(client.name(), "search", err)?;
                    continue;
                }
            };

            if results.is_empty() {
                debug!(provider = client.name(), page, "Empty result page; end of results");
                break;
            }

            for candidate in &results.candidates {
                let Some(score) = self.score(&query.title, candidate) else {
                    continue;
                };
                if score < best.score {
                    debug!(
                        provider = client.name(),
                        page,
                        id = %candidate.id,
                        title = %candidate.title,
                        score,
                        "New best candidate"
                    );
                    best = TitleMatch {
                        id: Some(candidate.id.clone()),
                        score,
                    };
                    if score == 0.0 {
                        return Ok(best);
                    }
                }
            }

            if results.is_last(page) {
                break;
            }
        }

        Ok(best)
    }

    /// Distance of `candidate` to `title`: the lower of its display and
    /// original titles. Candidates without a positive year, or with no
    /// comparable title, are not scored.
    fn score(&self, title: &str, candidate: &Candidate) -> Option<f64> {
        if !candidate.has_year() {
            return None;
        }
        let display = self.scorer.distance(title, &candidate.title);
        let original = candidate
            .original_title
            .as_deref()
            .map(|original| self.scorer.distance(title, original))
            .unwrap_or(MAX_DIFF);
        let best = display.min(original);
        (best < MAX_DIFF).then_some(best)
    }
}

impl Default for TitleResolver {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}
