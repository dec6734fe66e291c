use std::sync::Arc;

use reqwest::Client;

use crate::auth::AuthClient;
use crate::cache::ProfileCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::{IdentityHandle, IdentityResolver};
use crate::rest::RestClient;
use crate::services::{
    AccountService, EventService, NotificationService, SignupService, VolunteerService,
};
use crate::storage::{FileStore, KeyValueStore};

/// Shared client state: configured backend clients, storage and services.
pub struct Portal {
    pub config: Config,
    pub auth: Arc<AuthClient>,
    pub rest: Arc<RestClient>,
    /// Client-side storage holding the session and the profile cache.
    pub store: Arc<dyn KeyValueStore>,
    pub cache: ProfileCache,
    pub events: EventService,
    pub signups: SignupService,
    pub notifications: NotificationService,
    pub volunteers: VolunteerService,
    pub account: AccountService,
}

impl Portal {
    /// Build a portal persisting to the configured storage directory.
    pub fn new(config: Config) -> Result<Self> {
        let store = FileStore::new(config.storage.dir.clone());
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.backend.request_timeout())
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;

        let auth = Arc::new(AuthClient::new(
            http_client.clone(),
            &config.backend,
            &config.auth,
            store.clone(),
        ));
        let rest = Arc::new(RestClient::new(http_client, &config.backend, auth.clone()));
        let cache = ProfileCache::new(store.clone(), config.cache.max_age());

        let notifications = NotificationService::new(rest.clone());
        let events = EventService::new(rest.clone(), notifications.clone());
        let signups = SignupService::new(rest.clone());
        let volunteers = VolunteerService::new(rest.clone());
        let account = AccountService::new(
            auth.clone(),
            rest.clone(),
            config.auth.reset_redirect_url.clone(),
        );

        tracing::debug!("Portal client ready for {}", config.backend.url);

        Ok(Self {
            config,
            auth,
            rest,
            store,
            cache,
            events,
            signups,
            notifications,
            volunteers,
            account,
        })
    }

    /// Start resolving the signed-in user's profile.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn identity(&self) -> IdentityHandle {
        IdentityResolver::new(self.auth.clone(), self.rest.clone(), self.cache.clone()).start()
    }
}
