//! Session-scoped context.
//!
//! One `SessionContext` per logical user session owns the identity cache,
//! the profile sync guard and the query cache, so several sessions can live
//! in one process without sharing state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::{IdentityCache, IdentityProvider, ProfileSyncGuard, ProfileSyncSubscriber};
use crate::cache::{keys, QueryClient, QueryClientOptions};
use crate::resources::Resources;

pub struct SessionContext {
    identity: Arc<IdentityCache>,
    profile_sync: Arc<ProfileSyncGuard>,
    queries: QueryClient,
    api: ApiClient,
    resources: Resources,
}

impl SessionContext {
    pub fn new(api: ApiClient, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_options(api, provider, QueryClientOptions::default())
    }

    pub fn with_options(
        api: ApiClient,
        provider: Arc<dyn IdentityProvider>,
        options: QueryClientOptions,
    ) -> Self {
        let identity = Arc::new(IdentityCache::new(provider));
        let queries = QueryClient::new(options);
        let resources = Resources::new(api.clone(), Arc::clone(&identity), queries.clone());
        let profile_sync = Arc::new(ProfileSyncGuard::new(Arc::new(resources.clone())));
        Self {
            identity,
            profile_sync,
            queries,
            api,
            resources,
        }
    }

    pub fn identity(&self) -> &Arc<IdentityCache> {
        &self.identity
    }

    pub fn profile_sync(&self) -> &Arc<ProfileSyncGuard> {
        &self.profile_sync
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Unauthenticated base client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Follow the provider's identity changes until it goes away.
    ///
    /// Each change refreshes the identity cache and runs profile sync. A
    /// change of user also drops every user-scoped cache entry.
    pub fn watch_identity(&self) -> JoinHandle<()> {
        let mut changes = self.identity.provider().subscribe();
        let identity = Arc::clone(&self.identity);
        let queries = self.queries.clone();
        let mut subscriber = ProfileSyncSubscriber::new(Arc::clone(&self.profile_sync));

        tokio::spawn(async move {
            let initial = identity.identity().await;
            let _ = changes.borrow_and_update();
            let mut current_user = initial.as_ref().map(|i| i.id.clone());
            subscriber.on_identity(initial.as_ref()).await;

            while changes.changed().await.is_ok() {
                let next = changes.borrow_and_update().clone();
                identity.store(next.clone());

                let next_user = next.as_ref().map(|i| i.id.clone());
                if next_user != current_user {
                    info!(from = ?current_user, to = ?next_user, "Signed-in user changed, clearing user data");
                    for prefix in keys::user_scoped() {
                        queries.remove_queries(&prefix);
                    }
                    current_user = next_user;
                }

                subscriber.on_identity(next.as_ref()).await;
            }
            debug!("Identity provider closed, identity watch stopped");
        })
    }
}
