//! Query cache layer.
//!
//! This module provides:
//! - `QueryClient`: keyed cache with staleness windows, single-flight
//!   fetches, prefetching, invalidation and cancellation
//! - `QueryKey` and the `keys` constructors for every cached resource
//! - Staleness policy constants and `QueryOptions`
//!
//! Values live in memory only and are dropped 10 minutes after last use.

pub mod client;
pub mod entry;
pub mod error;
pub mod key;
pub mod policy;

pub use client::{QueryClient, QueryState};
pub use entry::CacheEntry;
pub use error::QueryError;
pub use key::{keys, KeySegment, QueryKey};
pub use policy::{QueryClientOptions, QueryOptions};
