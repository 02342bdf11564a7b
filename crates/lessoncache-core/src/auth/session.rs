use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use super::identity::{Identity, IdentityProvider};

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Persisted sign-in state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub token: String,
    pub created_at: DateTime<Utc>,
    /// When the provider said the token stops being valid, if it said at all.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionData {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
            token: token.into(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() > at).unwrap_or(false)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            access_token: self.token.clone(),
        }
    }
}

/// File-backed identity provider.
///
/// Every `current_identity` call re-reads the session file, so a sign-in
/// performed by another process is picked up. Subscribers are notified
/// whenever the observed identity changes.
pub struct SessionStore {
    data_dir: PathBuf,
    tx: watch::Sender<Option<Identity>>,
}

impl SessionStore {
    pub fn new(data_dir: PathBuf) -> Self {
        let (tx, _) = watch::channel(None);
        Self { data_dir, tx }
    }

    /// Load session from disk. Returns whether a valid session was found.
    pub fn load(&self) -> Result<bool> {
        let identity = self.read()?;
        let found = identity.is_some();
        self.publish(identity);
        Ok(found)
    }

    /// Persist a new session and notify subscribers.
    pub fn sign_in(&self, data: SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        debug!(user_id = %data.user_id, "Session saved");
        self.publish(Some(data.identity()));
        Ok(())
    }

    /// Remove the session file and notify subscribers.
    pub fn sign_out(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        self.publish(None);
        Ok(())
    }

    fn read(&self) -> Result<Option<Identity>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        if data.is_expired() {
            debug!(user_id = %data.user_id, "Session expired");
            return Ok(None);
        }
        Ok(Some(data.identity()))
    }

    fn publish(&self, identity: Option<Identity>) {
        self.tx.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        });
    }

    fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}

#[async_trait]
impl IdentityProvider for SessionStore {
    async fn current_identity(&self) -> Result<Option<Identity>> {
        let identity = self.read()?;
        self.publish(identity.clone());
        Ok(identity)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(id: &str) -> SessionData {
        let mut data = SessionData::new(id, "token-123");
        data.display_name = Some("Ada".into());
        data
    }

    #[tokio::test]
    async fn test_sign_in_then_read_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());
        assert!(store.current_identity().await.expect("read").is_none());

        store.sign_in(signed_in("u1")).expect("sign in");
        let identity = store.current_identity().await.expect("read").expect("identity");
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.access_token, "token-123");

        let reopened = SessionStore::new(dir.path().to_path_buf());
        assert!(reopened.load().expect("load"));
    }

    #[tokio::test]
    async fn test_expired_session_is_signed_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());
        let mut data = signed_in("u1");
        data.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        store.sign_in(data).expect("sign in");
        assert!(!store.load().expect("load"));
        assert!(store.current_identity().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());
        let mut rx = store.subscribe();

        store.sign_in(signed_in("u1")).expect("sign in");
        assert!(rx.has_changed().expect("open"));
        assert_eq!(rx.borrow_and_update().as_ref().map(|i| i.id.clone()), Some("u1".into()));

        // Re-reading the same session is not a change
        store.current_identity().await.expect("read");
        assert!(!rx.has_changed().expect("open"));

        store.sign_out().expect("sign out");
        assert!(rx.has_changed().expect("open"));
        assert!(rx.borrow_and_update().is_none());
    }
}
