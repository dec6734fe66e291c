use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};

use super::session::{AuthChange, AuthChangeEvent, AuthUser, SignUpOutcome, Session};
use super::AuthError;
use crate::config::{AuthConfig, BackendConfig};
use crate::logging;
use crate::storage::KeyValueStore;

/// Storage key of the persisted session.
pub const SESSION_KEY: &str = "portal.auth.session";

const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// Error body shapes used by the auth service.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the auth API, persisting the session in client-side storage.
pub struct AuthClient {
    http_client: Client,
    base_url: String,
    anon_key: String,
    store: Arc<dyn KeyValueStore>,
    refresh_margin: Duration,
    changes: broadcast::Sender<AuthChange>,
    // Serializes refreshes so a token is only exchanged once
    refresh_lock: Mutex<()>,
}

impl AuthClient {
    pub fn new(
        http_client: Client,
        backend: &BackendConfig,
        auth: &AuthConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            http_client,
            base_url: format!("{}/auth/v1", backend.url.trim_end_matches('/')),
            anon_key: backend.anon_key.clone(),
            store,
            refresh_margin: Duration::from_secs(auth.refresh_margin_secs),
            changes,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Subscribe to sign-in, sign-out, refresh and update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response = self
            .send(
                Method::POST,
                "/token?grant_type=password",
                self.request(Method::POST, "/token")
                    .query(&[("grant_type", "password")])
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;

        let session: Session = Self::parse(response).await?;
        let session = session.stamped(Utc::now());
        self.persist(Some(&session));
        tracing::info!("Signed in as {}", email);
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Create an account; `metadata` is stored on the auth user.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, AuthError> {
        let response = self
            .send(
                Method::POST,
                "/signup",
                self.request(Method::POST, "/signup").json(&json!({
                    "email": email,
                    "password": password,
                    "data": metadata,
                })),
            )
            .await?;

        let body: serde_json::Value = Self::parse(response).await?;

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
            let session = session.stamped(Utc::now());
            self.persist(Some(&session));
            tracing::info!("Account created and signed in: {}", email);
            self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
            return Ok(SignUpOutcome::SignedIn(session));
        }

        // Without a session the service returns the user, bare or wrapped
        let user = body.get("user").cloned().unwrap_or(body);
        let user: AuthUser =
            serde_json::from_value(user).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        tracing::info!("Account created for {}, confirmation pending", email);
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    /// Sign out. The local session is dropped even when the service call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.stored_session();

        if let Some(session) = &session {
            let result = self
                .send(
                    Method::POST,
                    "/logout",
                    self.request(Method::POST, "/logout")
                        .bearer_auth(&session.access_token),
                )
                .await;
            if let Err(e) = result {
                tracing::warn!("Remote sign-out failed, clearing local session anyway: {}", e);
            }
        }

        self.persist(None);
        self.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    /// Current session, refreshed first when it is about to expire.
    ///
    /// A refresh rejected by the service ends the session (`Ok(None)`);
    /// a transport failure is returned as an error.
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };

        if !session.expires_within(self.refresh_margin, Utc::now()) {
            return Ok(Some(session));
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };
        if !session.expires_within(self.refresh_margin, Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            tracing::info!("Session expired and cannot be refreshed");
            self.persist(None);
            self.emit(AuthChangeEvent::SignedOut, None);
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(AuthError::Api { status, message }) if (400..500).contains(&status) => {
                tracing::info!("Session refresh rejected ({}): {}", status, message);
                self.persist(None);
                self.emit(AuthChangeEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the signed-in user from the service.
    pub async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        let response = self
            .send(
                Method::GET,
                "/user",
                self.request(Method::GET, "/user")
                    .bearer_auth(&session.access_token),
            )
            .await?;

        Ok(Some(Self::parse(response).await?))
    }

    pub async fn update_password(&self, password: &str) -> Result<AuthUser, AuthError> {
        let session = self.get_session().await?.ok_or(AuthError::NoSession)?;

        let response = self
            .send(
                Method::PUT,
                "/user",
                self.request(Method::PUT, "/user")
                    .bearer_auth(&session.access_token)
                    .json(&json!({ "password": password })),
            )
            .await?;

        let user: AuthUser = Self::parse(response).await?;

        let mut updated = session;
        updated.user = user.clone();
        self.persist(Some(&updated));
        tracing::info!("Password updated for {}", user.id);
        self.emit(AuthChangeEvent::UserUpdated, Some(updated));
        Ok(user)
    }

    /// Send a password reset email linking to `redirect_to`.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let mut builder = self
            .request(Method::POST, "/recover")
            .json(&json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            builder = builder.query(&[("redirect_to", redirect_to)]);
        }

        self.send(Method::POST, "/recover", builder).await?;
        tracing::info!("Password reset requested for {}", email);
        Ok(())
    }

    /// Access token of the current session, refreshed if needed.
    pub async fn access_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.get_session().await?.map(|s| s.access_token))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .send(
                Method::POST,
                "/token?grant_type=refresh_token",
                self.request(Method::POST, "/token")
                    .query(&[("grant_type", "refresh_token")])
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;

        let session: Session = Self::parse(response).await?;
        let session = session.stamped(Utc::now());
        self.persist(Some(&session));
        tracing::debug!("Session refreshed for {}", session.user.id);
        self.emit(AuthChangeEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<Response, AuthError> {
        let started = Instant::now();

        let response = builder.send().await.map_err(|e| {
            logging::backend_call(method.as_str(), path, None, started);
            AuthError::RequestFailed(e.to_string())
        })?;

        let status = response.status();
        logging::backend_call(method.as_str(), path, Some(status.as_u16()), started);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let message = body
                .error_description
                .or(body.msg)
                .or(body.message)
                .or(body.error)
                .unwrap_or_else(|| format!("{}: {}", status, text));
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    fn stored_session(&self) -> Option<Session> {
        match self.store.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Discarding unreadable stored session: {}", e);
                    if let Err(e) = self.store.remove(SESSION_KEY) {
                        tracing::warn!("Failed to remove stored session: {}", e);
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Session storage unavailable: {}", e);
                None
            }
        }
    }

    fn persist(&self, session: Option<&Session>) {
        let result = match session {
            Some(session) => match serde_json::to_string(session) {
                Ok(raw) => self.store.set(SESSION_KEY, &raw),
                Err(e) => {
                    tracing::warn!("Failed to encode session: {}", e);
                    return;
                }
            },
            None => self.store.remove(SESSION_KEY),
        };

        if let Err(e) = result {
            tracing::warn!("Failed to persist session: {}", e);
        }
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        tracing::debug!("Auth state change: {}", event);
        // No receivers is fine, nobody is listening yet
        let _ = self.changes.send(AuthChange { event, session });
    }
}
