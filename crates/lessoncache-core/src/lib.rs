//! Client state layer for the prompt-engineering learning platform.
//!
//! - `api`: REST client for the platform backend
//! - `auth`: identity cache and profile sync
//! - `cache`: keyed query cache with staleness windows
//! - `resources`: typed queries and mutations on top of the cache
//! - `progress`: per-lesson section tracking
//! - `session`: one session's worth of the above

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod progress;
pub mod resources;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use auth::{Identity, IdentityCache, IdentityProvider, SessionStore};
pub use cache::{QueryClient, QueryError, QueryKey};
pub use config::{ApiEndpoints, Config, Environment};
pub use progress::{LessonError, LessonProgressTracker};
pub use resources::Resources;
pub use session::SessionContext;
