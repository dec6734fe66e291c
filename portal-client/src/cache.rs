//! Local profile cache.
//!
//! Keeps the last resolved [`Profile`] in client-side storage so a fresh
//! start can show who is signed in before the session is revalidated.
//! Every failure (unavailable storage, corrupt entry) degrades to a miss.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use portal_common::Profile;
use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;

/// Storage key of the current cache schema.
pub const CACHE_KEY: &str = "portal.profile.v2";

const CACHE_VERSION: u32 = 2;

/// Keys written by earlier schema versions, removed when the cache is opened.
const LEGACY_KEYS: &[&str] = &["user", "portal.profile.v1"];

#[derive(Debug, Serialize, Deserialize)]
struct CachedProfile {
    version: u32,
    profile: Profile,
    timestamp: DateTime<Utc>,
}

/// Single-slot cache of the last resolved profile.
#[derive(Clone)]
pub struct ProfileCache {
    store: Arc<dyn KeyValueStore>,
    max_age: Duration,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn KeyValueStore>, max_age: Duration) -> Self {
        let cache = Self { store, max_age };
        cache.purge_legacy();
        cache
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Cached profile, if present, well-formed and not older than the max age.
    pub fn read(&self) -> Option<Profile> {
        self.read_at(Utc::now())
    }

    pub fn read_at(&self, now: DateTime<Utc>) -> Option<Profile> {
        let raw = match self.store.get(CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Profile cache unavailable: {}", e);
                return None;
            }
        };

        let entry: CachedProfile = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Discarding corrupt profile cache entry: {}", e);
                self.clear();
                return None;
            }
        };

        if entry.version != CACHE_VERSION {
            tracing::debug!("Discarding profile cache entry with version {}", entry.version);
            self.clear();
            return None;
        }

        // Entries stamped in the future count as fresh
        let age = (now - entry.timestamp).to_std().unwrap_or_default();
        if age > self.max_age {
            tracing::debug!("Profile cache entry expired ({}s old)", age.as_secs());
            self.clear();
            return None;
        }

        Some(entry.profile)
    }

    /// Store `profile` stamped with the current time; `None` removes the entry.
    pub fn write(&self, profile: Option<&Profile>) {
        self.write_at(profile, Utc::now())
    }

    pub fn write_at(&self, profile: Option<&Profile>, now: DateTime<Utc>) {
        let Some(profile) = profile else {
            self.clear();
            return;
        };

        let entry = CachedProfile {
            version: CACHE_VERSION,
            profile: profile.clone(),
            timestamp: now,
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to encode profile cache entry: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(CACHE_KEY, &raw) {
            tracing::warn!("Failed to write profile cache: {}", e);
        }
    }

    fn clear(&self) {
        if let Err(e) = self.store.remove(CACHE_KEY) {
            tracing::warn!("Failed to clear profile cache: {}", e);
        }
    }

    fn purge_legacy(&self) {
        for key in LEGACY_KEYS {
            if let Err(e) = self.store.remove(key) {
                tracing::debug!("Failed to remove legacy cache key {}: {}", key, e);
            }
        }
    }
}
