//! Authentication module for the current user's identity.
//!
//! This module provides:
//! - `Identity` and the `IdentityProvider` seam to whatever signs users in
//! - `SessionStore`: a file-backed identity provider
//! - `IdentityCache`: a short-lived, single-flight cache in front of a provider
//! - `ProfileSyncGuard`: the debounced background push of profile changes
//!
//! Cached identities are trusted for 5 seconds; profile pushes happen at most
//! once per 30 second cooldown.

pub mod cache;
pub mod identity;
pub mod profile_sync;
pub mod session;

pub use cache::{IdentityCache, IDENTITY_TTL};
pub use identity::{Identity, IdentityProvider, UserProfile};
pub use profile_sync::{
    ProfileSink, ProfileSnapshot, ProfileSyncGuard, ProfileSyncSubscriber, SkipReason,
    SyncOutcome, PROFILE_SYNC_COOLDOWN,
};
pub use session::{SessionData, SessionStore};
