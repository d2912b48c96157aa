//! Crossid-Common: Shared types and error taxonomy.
//!
//! This crate provides the vocabulary shared by provider adapters and the
//! resolution engine:
//!
//! - **Lookup Types**: Requests, search queries, candidates and result pages
//! - **Known Ids**: The caller-owned source-to-identifier map
//! - **Error Handling**: The provider failure taxonomy and result alias
//!
//! # Examples
//!
//! ```
//! use crossid_common::{Candidate, KnownIds, LookupRequest, MediaKind, ProviderError, Result};
//!
//! let request = LookupRequest::new("Avatar", MediaKind::Movie).with_year(2009);
//! let query = request.query_for(&request.title);
//! assert_eq!(query.year, Some(2009));
//!
//! let mut known = KnownIds::new();
//! known.insert("imdb", "tt0499549");
//! assert!(known.contains("imdb"));
//!
//! let candidate = Candidate::new("19995", "Avatar", Some(2009));
//! assert!(candidate.has_year());
//!
//! fn example() -> Result<()> {
//!     Err(ProviderError::transient("HTTP 503"))
//! }
//! assert!(example().unwrap_err().is_transient());
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{FailureKind, ProviderError, Result};
pub use ids::*;
pub use types::*;
