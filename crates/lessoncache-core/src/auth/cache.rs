//! Short-lived cache of the current identity.
//!
//! Reads within [`IDENTITY_TTL`] of the last provider call are served from
//! memory. Once the entry expires, exactly one caller refreshes it while any
//! concurrent callers wait for that refresh instead of calling the provider
//! themselves. A signed-out answer is cached like any other.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::identity::{Identity, IdentityProvider, UserProfile};

/// How long a provider answer is trusted.
pub const IDENTITY_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Snapshot {
    identity: Option<Identity>,
    /// `None` until the first successful provider call, and after `invalidate`.
    fetched_at: Option<Instant>,
    /// Count of finished provider calls, successful or not.
    attempts: u64,
    last_attempt_failed: bool,
}

impl Snapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at
            .map(|at| at.elapsed() < ttl)
            .unwrap_or(false)
    }
}

pub struct IdentityCache {
    provider: Arc<dyn IdentityProvider>,
    ttl: Duration,
    state: RwLock<Snapshot>,
    refresh: Mutex<()>,
}

impl IdentityCache {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_ttl(provider, IDENTITY_TTL)
    }

    pub fn with_ttl(provider: Arc<dyn IdentityProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            state: RwLock::new(Snapshot::default()),
            refresh: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Current identity, refreshing from the provider when the cached copy
    /// has expired. Never fails: a provider error yields the last known
    /// identity (or `None`) and is logged.
    pub async fn identity(&self) -> Option<Identity> {
        let seen_attempts = {
            let state = self.read_state();
            if state.is_fresh(self.ttl) {
                return state.identity.clone();
            }
            state.attempts
        };

        let _refresh = self.refresh.lock().await;

        {
            let state = self.read_state();
            if state.is_fresh(self.ttl) {
                return state.identity.clone();
            }
            // The refresh we waited on failed; share its fallback
            if state.attempts != seen_attempts && state.last_attempt_failed {
                return state.identity.clone();
            }
        }

        debug!("Refreshing cached identity");
        let result = self.provider.current_identity().await;

        let mut state = self.write_state();
        state.attempts += 1;
        match result {
            Ok(identity) => {
                state.identity = identity;
                state.fetched_at = Some(Instant::now());
                state.last_attempt_failed = false;
            }
            Err(e) => {
                warn!(error = %e, "Identity provider call failed, using last known identity");
                state.last_attempt_failed = true;
            }
        }
        state.identity.clone()
    }

    /// Non-blocking read of the cached identity. `None` when signed out or
    /// when the cached copy is no longer fresh.
    pub fn peek(&self) -> Option<Identity> {
        let state = self.read_state();
        if state.is_fresh(self.ttl) {
            state.identity.clone()
        } else {
            None
        }
    }

    /// Whether `peek` currently reflects a fresh provider answer.
    pub fn is_fresh(&self) -> bool {
        self.read_state().is_fresh(self.ttl)
    }

    /// Record an identity pushed by the provider's change notification.
    pub fn store(&self, identity: Option<Identity>) {
        let mut state = self.write_state();
        state.identity = identity;
        state.fetched_at = Some(Instant::now());
        state.last_attempt_failed = false;
    }

    /// Force the next `identity` call to consult the provider.
    pub fn invalidate(&self) {
        let mut state = self.write_state();
        state.identity = None;
        state.fetched_at = None;
    }

    /// `"Bearer <token>"` for the current identity, or an empty string.
    pub async fn auth_header_value(&self) -> String {
        self.identity()
            .await
            .map(|identity| identity.auth_header_value())
            .unwrap_or_default()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.identity()
            .await
            .map(|identity| identity.access_token)
            .filter(|token| !token.is_empty())
    }

    pub async fn user_profile(&self) -> Option<UserProfile> {
        self.identity().await.map(|identity| identity.profile())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tokio::sync::watch;

    struct FakeProvider {
        calls: AtomicUsize,
        identity: std::sync::Mutex<Option<Identity>>,
        fail: AtomicBool,
        tx: watch::Sender<Option<Identity>>,
    }

    impl FakeProvider {
        fn new(identity: Option<Identity>) -> Arc<Self> {
            let (tx, _) = watch::channel(identity.clone());
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                identity: std::sync::Mutex::new(identity),
                fail: AtomicBool::new(false),
                tx,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn current_identity(&self) -> Result<Option<Identity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("provider unavailable"));
            }
            Ok(self.identity.lock().expect("lock").clone())
        }

        fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
            self.tx.subscribe()
        }
    }

    fn user(id: &str) -> Identity {
        Identity {
            id: id.into(),
            display_name: Some("User".into()),
            email: None,
            access_token: format!("token-{}", id),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_scenario() {
        let provider = FakeProvider::new(Some(user("a")));
        let cache = IdentityCache::new(provider.clone());

        assert_eq!(cache.identity().await.map(|i| i.id), Some("a".into()));
        assert_eq!(provider.calls(), 1);

        tokio::time::advance(Duration::from_millis(3000)).await;
        assert_eq!(cache.identity().await.map(|i| i.id), Some("a".into()));
        assert_eq!(provider.calls(), 1);

        tokio::time::advance(Duration::from_millis(3000)).await;
        cache.identity().await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_call() {
        let provider = FakeProvider::new(Some(user("a")));
        let cache = IdentityCache::new(provider.clone());

        let results = futures::future::join_all((0..8).map(|_| cache.identity())).await;
        assert!(results.iter().all(|r| r.as_ref().map(|i| i.id.as_str()) == Some("a")));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_out_is_cached() {
        let provider = FakeProvider::new(None);
        let cache = IdentityCache::new(provider.clone());

        assert!(cache.identity().await.is_none());
        assert!(cache.identity().await.is_none());
        assert!(cache.is_fresh());
        assert_eq!(provider.calls(), 1);
        assert_eq!(cache.auth_header_value().await, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_falls_back_to_last_known() {
        let provider = FakeProvider::new(Some(user("a")));
        let cache = IdentityCache::new(provider.clone());
        cache.identity().await;

        provider.fail.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(6)).await;

        let results = futures::future::join_all((0..4).map(|_| cache.identity())).await;
        assert!(results.iter().all(|r| r.as_ref().map(|i| i.id.as_str()) == Some("a")));
        // One refresh attempt for the whole burst
        assert_eq!(provider.calls(), 2);
        assert!(cache.peek().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_history_yields_none() {
        let provider = FakeProvider::new(Some(user("a")));
        provider.fail.store(true, Ordering::SeqCst);
        let cache = IdentityCache::new(provider.clone());
        assert!(cache.identity().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_and_invalidate() {
        let provider = FakeProvider::new(Some(user("a")));
        let cache = IdentityCache::new(provider.clone());
        assert!(cache.peek().is_none());

        cache.identity().await;
        assert_eq!(cache.peek().map(|i| i.id), Some("a".into()));
        assert_eq!(cache.auth_header_value().await, "Bearer token-a");

        cache.invalidate();
        assert!(cache.peek().is_none());
        cache.identity().await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_from_change_notification() {
        let provider = FakeProvider::new(Some(user("a")));
        let cache = IdentityCache::new(provider.clone());
        cache.store(Some(user("b")));
        assert_eq!(cache.identity().await.map(|i| i.id), Some("b".into()));
        assert_eq!(provider.calls(), 0);
        assert_eq!(
            cache.user_profile().await.map(|p| p.sub),
            Some("b".to_string())
        );
    }
}
