//! Failure policy: what a classified provider error means for the step that
//! raised it.
//!
//! `NotFound` and `Malformed` are always recovered locally; the current page
//! or strategy simply yields nothing. `Transient` is recovered the same way
//! unless the caller opted into strict mode, in which case it aborts the whole
//! resolution so a batch runner can pause instead of recording false misses.

use crossid_common::{FailureKind, ProviderError};
use tracing::{debug, error, warn};

use super::ResolveError;

/// Strict or lenient handling of transient provider failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    strict: bool,
}

impl FailurePolicy {
    /// Create a policy. `strict` makes transient failures abort resolution.
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Transient failures propagate.
    pub fn strict() -> Self {
        Self::new(true)
    }

    /// Transient failures are logged and treated as "no match".
    pub fn lenient() -> Self {
        Self::new(false)
    }

    /// Returns `true` in strict mode.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Apply the policy to `err` raised by `provider` during `operation`.
    ///
    /// `Ok(())` means the failure was absorbed and the caller should carry on
    /// as if the step produced no result.
    pub fn handle(
        &self,
        provider: &str,
        operation: &'static str,
        err: ProviderError,
    ) -> Result<(), ResolveError> {
        match err.kind() {
            FailureKind::NotFound => {
                debug!(provider, operation, error = %err, "Provider has no matching record");
                Ok(())
            }
            FailureKind::Malformed => {
                error!(
                    provider,
                    operation,
                    error = %err,
                    "Provider response could not be parsed; integration may need maintenance"
                );
                Ok(())
            }
            FailureKind::Transient if self.strict => {
                warn!(provider, operation, error = %err, "Provider unavailable; aborting resolution");
                Err(ResolveError::Unavailable {
                    provider: provider.to_string(),
                    operation,
                    source: err,
                })
            }
            FailureKind::Transient => {
                warn!(provider, operation, error = %err, "Provider unavailable; treating as no match");
                Ok(())
            }
        }
    }
}
