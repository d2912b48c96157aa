//! Concrete metadata provider implementations.
//!
//! Each submodule wraps a single external API and implements the
//! [`ProviderSearchClient`](super::ProviderSearchClient) and
//! [`MetadataProvider`](super::MetadataProvider) traits.

pub mod omdb;
pub mod tmdb;

pub use omdb::OmdbProvider;
pub use tmdb::TmdbProvider;
