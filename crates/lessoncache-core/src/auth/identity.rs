use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
}

impl Identity {
    /// `"Bearer <token>"`, or empty when there is no token to send.
    pub fn auth_header_value(&self) -> String {
        if self.access_token.is_empty() {
            String::new()
        } else {
            format!("Bearer {}", self.access_token)
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            sub: self.id.clone(),
            name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Minimal user profile derived from an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Source of truth for who is signed in.
///
/// `current_identity` returning `Ok(None)` means signed out; that is a valid
/// state, not an error. `subscribe` yields a receiver that changes whenever
/// the provider's identity does.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>>;

    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}
