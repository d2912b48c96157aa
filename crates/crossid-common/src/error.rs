//! Provider error taxonomy shared by every adapter and the resolution engine.
//!
//! Adapters classify their failures once, at the HTTP boundary, into one of
//! three kinds. Everything above the adapter reasons only in terms of
//! [`FailureKind`] and never re-inspects status codes or transport errors.

use std::fmt;

/// Coarse classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The provider answered, but has no matching record.
    NotFound,
    /// The provider is temporarily unavailable (rate limit, 5xx, timeout).
    Transient,
    /// The provider response could not be understood (schema or layout drift).
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Transient => write!(f, "transient"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}

/// Error returned by provider clients (search, cross reference, detail fetch).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider responded successfully but has no matching record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider is temporarily unavailable.
    #[error("Provider temporarily unavailable: {0}")]
    Transient(String),

    /// The provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Transient error.
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a new Malformed error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::Malformed(msg.into())
    }

    /// Taxonomy kind of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::Transient(_) => FailureKind::Transient,
            Self::Malformed(_) => FailureKind::Malformed,
        }
    }

    /// Returns `true` when retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

/// Result type alias for provider calls.
pub type Result<T> = std::result::Result<T, ProviderError>;
