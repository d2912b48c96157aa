//! Metadata providers and the records they serve.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definitions and shared data types.
//! - [`providers`] -- Concrete provider implementations (TMDB, OMDb).
//! - [`registry`] -- Provider registry for multi-source resolution.
//! - [`details`] -- Cached detail lookups for resolved ids.

pub mod details;
pub mod provider;
pub mod providers;
pub mod registry;

pub use details::{DetailService, MediaDetails};
pub use provider::{
    CachedRecord, ImageInfo, MediaImages, MediaMetadata, MetadataProvider, ProviderSearchClient,
    Trailer, WebSearchScope,
};
pub use registry::{ProviderRegistry, ProviderResolution};
