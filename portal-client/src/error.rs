//! Error types for portal operations.

use portal_common::RecordId;

use crate::auth::AuthError;
use crate::rest::RestError;

/// Errors surfaced to the user of the portal.
///
/// Nothing is retried automatically; callers report the error and the user
/// resubmits the action.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already signed up for event {0}")]
    AlreadySignedUp(RecordId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
