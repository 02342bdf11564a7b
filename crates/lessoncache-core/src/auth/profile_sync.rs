//! Best-effort push of the signed-in user's profile to the backend.
//!
//! `ProfileSyncGuard` is shared by everything that reacts to identity
//! changes. It allows one push at a time and at most one successful push per
//! [`PROFILE_SYNC_COOLDOWN`], whoever is signed in. A failed push leaves the
//! cooldown untouched so the next trigger can retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::identity::Identity;

pub const PROFILE_SYNC_COOLDOWN: Duration = Duration::from_secs(30);

/// Denormalized profile fields the backend keeps for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<&Identity> for ProfileSnapshot {
    fn from(identity: &Identity) -> Self {
        Self {
            name: identity.display_name.clone(),
            email: identity.email.clone(),
        }
    }
}

/// Destination of profile pushes.
#[async_trait]
pub trait ProfileSink: Send + Sync {
    async fn push_profile(&self, profile: &ProfileSnapshot) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Failed,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoIdentity,
    InFlight,
    CoolingDown,
    AlreadySynced,
}

pub struct ProfileSyncGuard {
    sink: Arc<dyn ProfileSink>,
    cooldown: Duration,
    in_progress: AtomicBool,
    /// Time of the last successful push.
    last_synced: Mutex<Option<Instant>>,
}

/// Clears the in-progress flag even if the push future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ProfileSyncGuard {
    pub fn new(sink: Arc<dyn ProfileSink>) -> Self {
        Self::with_cooldown(sink, PROFILE_SYNC_COOLDOWN)
    }

    pub fn with_cooldown(sink: Arc<dyn ProfileSink>, cooldown: Duration) -> Self {
        Self {
            sink,
            cooldown,
            in_progress: AtomicBool::new(false),
            last_synced: Mutex::new(None),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn last_synced_at(&self) -> Option<Instant> {
        *self.last_synced.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the profile derived from `identity` unless a push is already
    /// running or any push succeeded within the cooldown.
    pub async fn sync_if_needed(&self, identity: Option<&Identity>) -> SyncOutcome {
        let Some(identity) = identity else {
            return SyncOutcome::Skipped(SkipReason::NoIdentity);
        };

        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(user_id = %identity.id, "Profile sync already in flight");
            return SyncOutcome::Skipped(SkipReason::InFlight);
        }
        let _in_flight = InFlight(&self.in_progress);

        if self.cooling_down() {
            debug!(user_id = %identity.id, "Profile sync cooling down");
            return SyncOutcome::Skipped(SkipReason::CoolingDown);
        }

        let snapshot = ProfileSnapshot::from(identity);
        match self.sink.push_profile(&snapshot).await {
            Ok(()) => {
                *self.last_synced.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
                info!(user_id = %identity.id, "Profile synced");
                SyncOutcome::Synced
            }
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "Profile sync failed");
                SyncOutcome::Failed
            }
        }
    }

    fn cooling_down(&self) -> bool {
        self.last_synced_at()
            .map(|at| at.elapsed() < self.cooldown)
            .unwrap_or(false)
    }
}

/// One listener's view of profile sync: push once per signed-in user.
///
/// The user counts as synced only after a push of its own succeeds. A skip
/// (another push in flight, or the cooldown) or a failure leaves the next
/// identity event free to try again. Signing in as someone else resets it.
pub struct ProfileSyncSubscriber {
    guard: Arc<ProfileSyncGuard>,
    synced_for: Option<String>,
}

impl ProfileSyncSubscriber {
    pub fn new(guard: Arc<ProfileSyncGuard>) -> Self {
        Self {
            guard,
            synced_for: None,
        }
    }

    pub async fn on_identity(&mut self, identity: Option<&Identity>) -> SyncOutcome {
        let Some(identity) = identity else {
            self.synced_for = None;
            return SyncOutcome::Skipped(SkipReason::NoIdentity);
        };

        if self.synced_for.as_deref() == Some(identity.id.as_str()) {
            return SyncOutcome::Skipped(SkipReason::AlreadySynced);
        }

        self.synced_for = None;
        let outcome = self.guard.sync_if_needed(Some(identity)).await;
        if outcome == SyncOutcome::Synced {
            self.synced_for = Some(identity.id.clone());
        }
        outcome
    }
}
