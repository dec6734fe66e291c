//! Client for the hosted auth service.

mod client;
mod session;

pub use client::{AuthClient, SESSION_KEY};
pub use session::{AuthChange, AuthChangeEvent, AuthUser, SignUpOutcome, Session};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("No active session")]
    NoSession,
}

impl AuthError {
    /// Status code returned by the auth service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
