//! REST API client module for the learning platform backend.
//!
//! This module provides the `ApiClient` for fetching categories, lessons,
//! practice challenges, portfolio, roadmap and dashboard data, and for
//! streaming free-form prompt completions from the playground endpoint.
//!
//! Requests carry an optional bearer token taken from the current identity.

pub mod client;
pub mod error;
pub mod stream;

pub use client::ApiClient;
pub use error::ApiError;
pub use stream::{decode_text_stream, Utf8ChunkDecoder};
