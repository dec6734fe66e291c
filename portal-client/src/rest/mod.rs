//! Client for the hosted data API (filtered reads and row mutations).

mod client;
mod query;

pub use client::RestClient;
pub use query::{parse_content_range, Query};

use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Expected at most one row, got {0}")]
    MultipleRows(usize),
    #[error("Refusing to {0} without a filter")]
    UnfilteredMutation(&'static str),
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}
