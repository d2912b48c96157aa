//! Crossid - Cross-source identifier resolution
//!
//! Resolves a title (plus optional original title and year) to the
//! identifier each configured metadata provider uses for it. Known ids are
//! shared between providers so one adapter can cross-reference another's
//! result instead of searching.
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod metadata;
pub mod resolver;
pub mod similarity;
pub mod websearch;
