pub mod mock_backend;

use std::sync::Arc;

use portal_common::{Profile, Role};
use uuid::Uuid;

use crate::config::Config;
use crate::storage::MemoryStore;
use crate::Portal;

pub const TEST_ANON_KEY: &str = "test-anon-key";

pub fn test_config(backend_url: &str) -> Config {
    let mut config = Config::for_backend(backend_url, TEST_ANON_KEY);
    config.backend.request_timeout_secs = 5;
    config.logging.level = "debug".to_string();
    config
}

pub fn test_profile(role: Role) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        email: "test@example.fr".to_string(),
        role,
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
    }
}

/// A portal against `backend_url` with in-memory storage.
pub fn portal_with_memory_store(backend_url: &str) -> (Portal, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let portal = Portal::with_store(test_config(backend_url), store.clone())
        .expect("Failed to build test portal");
    (portal, store)
}
