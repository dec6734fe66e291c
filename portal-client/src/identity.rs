//! Identity resolution.
//!
//! Turns the auth service's session into the application [`Profile`] of the
//! signed-in user and keeps it current as the session changes. Consumers
//! observe a [`UserState`] through a watch channel.
//!
//! Each resolution attempt takes a ticket from a shared sequence; only a
//! result holding the latest ticket is applied, so a slow lookup started
//! before a logout can never overwrite the logout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use portal_common::{Profile, ProfileRow};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::auth::{AuthChange, AuthClient, AuthError, Session};
use crate::cache::ProfileCache;
use crate::rest::{Query, RestClient, RestError};

/// Source of the current session and of session changes.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

/// Lookup of profile rows in the `users` relation.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, RestError>;
}

#[async_trait]
impl SessionSource for AuthClient {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        self.get_session().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        AuthClient::subscribe(self)
    }
}

#[async_trait]
impl ProfileDirectory for RestClient {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, RestError> {
        let query = Query::table("users")
            .select("role, prenom, nom")
            .eq("id", user_id);
        self.select_maybe_single(&query).await
    }
}

/// Where the resolver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Seeded from the cache, nothing resolved yet
    Init,
    /// A session and profile lookup is in flight
    Resolving,
    /// The latest lookup has been applied
    Resolved,
}

/// Observable identity state.
#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    pub profile: Option<Profile>,
    /// True until the first resolution completes
    pub loading: bool,
    pub phase: Phase,
}

impl UserState {
    fn seeded(profile: Option<Profile>) -> Self {
        Self {
            profile,
            loading: true,
            phase: Phase::Init,
        }
    }
}

/// Resolves the signed-in user's profile from the session, the `users`
/// relation and the local cache.
pub struct IdentityResolver {
    sessions: Arc<dyn SessionSource>,
    directory: Arc<dyn ProfileDirectory>,
    cache: ProfileCache,
}

impl IdentityResolver {
    pub fn new(
        sessions: Arc<dyn SessionSource>,
        directory: Arc<dyn ProfileDirectory>,
        cache: ProfileCache,
    ) -> Self {
        Self {
            sessions,
            directory,
            cache,
        }
    }

    /// Seed state from the cache, start resolving the current session and
    /// follow auth changes until the returned handle is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> IdentityHandle {
        let cached = self.cache.read();
        if cached.is_some() {
            tracing::debug!("Seeded identity from cached profile");
        }

        let (state, state_rx) = watch::channel(UserState::seeded(cached));
        // Subscribe before the first lookup so no change slips between them
        let changes = self.sessions.subscribe();

        let shared = Arc::new(Shared {
            sessions: self.sessions,
            directory: self.directory,
            cache: self.cache,
            state,
            latest_ticket: Mutex::new(0),
            mounted: AtomicBool::new(true),
        });

        Shared::spawn_resolution(&shared, Trigger::Current);
        let listener = tokio::spawn(listen(shared.clone(), changes));

        IdentityHandle {
            shared,
            state_rx,
            listener,
        }
    }
}

struct Shared {
    sessions: Arc<dyn SessionSource>,
    directory: Arc<dyn ProfileDirectory>,
    cache: ProfileCache,
    state: watch::Sender<UserState>,
    latest_ticket: Mutex<u64>,
    mounted: AtomicBool,
}

/// What a resolution starts from.
enum Trigger {
    /// Ask the auth service for the current session
    Current,
    /// Use the session delivered with an auth change
    Change(Option<Session>),
}

impl Shared {
    /// Issue the next ticket and mark the state as resolving.
    fn issue_ticket(&self) -> u64 {
        let mut latest = self.latest_ticket.lock().unwrap_or_else(|e| e.into_inner());
        *latest += 1;
        self.state.send_modify(|s| s.phase = Phase::Resolving);
        *latest
    }

    fn spawn_resolution(shared: &Arc<Self>, trigger: Trigger) {
        let ticket = shared.issue_ticket();
        let shared = shared.clone();
        tokio::spawn(async move {
            shared.resolve(ticket, trigger).await;
        });
    }

    async fn resolve(&self, ticket: u64, trigger: Trigger) {
        let session = match trigger {
            Trigger::Change(session) => session,
            Trigger::Current => match self.sessions.current_session().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!("Failed to read current session: {}", e);
                    None
                }
            },
        };

        let profile = match session {
            Some(session) => self.lookup(&session).await,
            None => None,
        };

        self.apply(ticket, profile);
    }

    async fn lookup(&self, session: &Session) -> Option<Profile> {
        let user = &session.user;
        match self.directory.find_profile(user.id).await {
            Ok(Some(row)) => Some(Profile::from_row(user.id, user.email.as_deref(), row)),
            Ok(None) => {
                tracing::debug!("No users row for {} yet, using session metadata", user.id);
                Some(Profile::from_metadata(
                    user.id,
                    user.email.as_deref(),
                    &user.user_metadata,
                ))
            }
            Err(e) => {
                tracing::error!("Failed to load profile for {}: {}", user.id, e);
                None
            }
        }
    }

    /// Publish a result if it is still the latest and the handle is alive.
    fn apply(&self, ticket: u64, profile: Option<Profile>) {
        // Held while publishing so a newer ticket cannot be applied first
        let latest = self.latest_ticket.lock().unwrap_or_else(|e| e.into_inner());

        if !self.mounted.load(Ordering::SeqCst) {
            tracing::debug!("Identity handle dropped, discarding resolution {}", ticket);
            return;
        }
        if *latest != ticket {
            tracing::debug!(
                "Discarding stale resolution {} (latest is {})",
                ticket,
                *latest
            );
            return;
        }

        self.cache.write(profile.as_ref());
        match &profile {
            Some(p) => tracing::info!("Resolved identity {} ({})", p.id, p.role),
            None => tracing::info!("No signed-in user"),
        }
        self.state.send_replace(UserState {
            profile,
            loading: false,
            phase: Phase::Resolved,
        });
    }
}

async fn listen(shared: Arc<Shared>, changes: broadcast::Receiver<AuthChange>) {
    let mut stream = BroadcastStream::new(changes);

    while let Some(item) = stream.next().await {
        if !shared.mounted.load(Ordering::SeqCst) {
            break;
        }
        match item {
            Ok(change) => {
                tracing::debug!("Auth change {}, resolving identity", change.event);
                Shared::spawn_resolution(&shared, Trigger::Change(change.session));
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!("Missed {} auth changes, re-reading session", missed);
                Shared::spawn_resolution(&shared, Trigger::Current);
            }
        }
    }
}

/// Live view of the resolved identity. Dropping it stops following auth
/// changes and suppresses any result still in flight.
pub struct IdentityHandle {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<UserState>,
    listener: JoinHandle<()>,
}

impl IdentityHandle {
    pub fn state(&self) -> UserState {
        self.state_rx.borrow().clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state_rx.borrow().profile.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state_rx.borrow().loading
    }

    pub fn phase(&self) -> Phase {
        self.state_rx.borrow().phase
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<UserState> {
        self.state_rx.clone()
    }

    /// Wait until the latest resolution has been applied.
    pub async fn resolved(&self) -> UserState {
        let mut rx = self.state_rx.clone();
        let result = rx.wait_for(|s| s.phase == Phase::Resolved).await;
        match result {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Re-read the current session and resolve again.
    pub fn revalidate(&self) {
        Shared::spawn_resolution(&self.shared, Trigger::Current);
    }
}

impl Drop for IdentityHandle {
    fn drop(&mut self) {
        self.shared.mounted.store(false, Ordering::SeqCst);
        self.listener.abort();
    }
}
