//! Cross-source identifier resolution.
//!
//! - [`TitleResolver`] runs the staged, score-bounded title search against
//!   one provider.
//! - [`ExternalLookupGateway`] tries the resolution strategies in priority
//!   order (known id, cross reference, title, original title, web search).
//! - [`FailurePolicy`] decides whether a classified provider failure aborts
//!   the resolution or only the current step.

mod error;
mod gateway;
mod policy;
mod title;

pub use error::ResolveError;
pub use gateway::{ExternalLookupGateway, ResolutionResult, Strategy};
pub use policy::FailurePolicy;
pub use title::{TitleMatch, TitleResolver, MAX_PAGES};
