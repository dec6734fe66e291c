pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod portal;
pub mod rest;
pub mod services;
pub mod storage;
pub mod test_util;

pub use auth::{AuthChange, AuthChangeEvent, AuthClient, AuthError, AuthUser, Session, SignUpOutcome};
pub use cache::ProfileCache;
pub use config::Config;
pub use error::{Error, Result};
pub use identity::{IdentityHandle, IdentityResolver, Phase, ProfileDirectory, SessionSource, UserState};
pub use portal::Portal;
pub use rest::{Query, RestClient, RestError};
pub use services::{
    AccountService, EventService, HoursSummary, NotificationService, Registration, SignupService,
    VolunteerService,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
