use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Session issued by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds at issue time
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Expiry as a unix timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// Fill `expires_at` from `expires_in` when the service only sent the latter.
    pub(crate) fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now.timestamp() + secs);
        }
        self
    }

    /// Whether the session is expired or expires within `margin` of `now`.
    /// Sessions without a known expiry never count as expiring.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now.timestamp() + margin.as_secs() as i64,
            None => false,
        }
    }
}

/// Identity embedded in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form claims set at sign-up (role, names)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_metadata: HashMap<String, serde_json::Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Kind of auth state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl std::fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthChangeEvent::SignedIn => write!(f, "SIGNED_IN"),
            AuthChangeEvent::SignedOut => write!(f, "SIGNED_OUT"),
            AuthChangeEvent::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
            AuthChangeEvent::UserUpdated => write!(f, "USER_UPDATED"),
            AuthChangeEvent::PasswordRecovery => write!(f, "PASSWORD_RECOVERY"),
        }
    }
}

/// Notification delivered on the auth-change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

/// Result of a sign-up.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Account created and signed in
    SignedIn(Session),
    /// Account created, email confirmation pending
    ConfirmationRequired(AuthUser),
}

impl SignUpOutcome {
    pub fn user(&self) -> &AuthUser {
        match self {
            SignUpOutcome::SignedIn(session) => &session.user,
            SignUpOutcome::ConfirmationRequired(user) => user,
        }
    }
}
