//! Errors that escape a resolution call.

use crossid_common::ProviderError;

/// Error returned by [`TitleResolver`](super::TitleResolver) and
/// [`ExternalLookupGateway`](super::ExternalLookupGateway).
///
/// Ordinary misses never surface here: "nothing found" is an `Ok` result with
/// no id. Only a strict-mode transient failure or an unusable request aborts a
/// resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A provider was temporarily unavailable and the caller asked for strict
    /// handling. The batch caller should pause and retry later instead of
    /// recording a miss.
    #[error("Provider '{provider}' unavailable during {operation}: {source}")]
    Unavailable {
        /// Provider name.
        provider: String,
        /// Step that failed (e.g. "search", "cross reference").
        operation: &'static str,
        /// Classified provider error.
        #[source]
        source: ProviderError,
    },

    /// The lookup request cannot be resolved as given.
    #[error("Invalid lookup request: {0}")]
    InvalidRequest(String),
}

impl ResolveError {
    /// Returns `true` when retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
