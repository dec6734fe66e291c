//! Notifications shown to volunteers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::RecordId;

/// Kind written on notifications announcing a new event.
pub const NEW_EVENT_KIND: &str = "nouvel_evenement";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    pub user_id: Uuid,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Raw timestamp as stored, with or without an offset
    pub created_at: String,
    #[serde(rename = "vu", default)]
    pub seen: bool,
}

impl Notification {
    /// Creation time, when the stored value parses.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    }
}

/// Row inserted for each recipient of a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl NewNotification {
    /// Announcement of a newly created event.
    pub fn new_event(user_id: Uuid, title: &str) -> Self {
        Self {
            user_id,
            message: format!("Nouvel événement : {}", title),
            kind: NEW_EVENT_KIND.to_string(),
        }
    }
}
