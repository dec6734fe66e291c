use std::sync::Arc;

use portal_common::{NewNotification, Notification, Profile, Role};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::require_profile;
use crate::error::Result;
use crate::rest::{Query, RestClient};

#[derive(Debug, Deserialize)]
struct UserId {
    id: Uuid,
}

#[derive(Clone)]
pub struct NotificationService {
    rest: Arc<RestClient>,
}

impl NotificationService {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    /// The actor's notifications, newest first. Unseen ones are marked seen
    /// on the backend; the returned rows keep their state as fetched.
    pub async fn list_and_mark_seen(&self, actor: Option<&Profile>) -> Result<Vec<Notification>> {
        let profile = require_profile(actor)?;

        let query = Query::table("notifications")
            .select("*")
            .eq("user_id", profile.id)
            .order("created_at", false);
        let notifications: Vec<Notification> = self.rest.select(&query).await?;

        let unseen: Vec<_> = notifications
            .iter()
            .filter(|n| !n.seen)
            .map(|n| n.id.clone())
            .collect();

        if !unseen.is_empty() {
            let count = unseen.len();
            let query = Query::table("notifications").in_list("id", unseen);
            self.rest.update(&query, &json!({ "vu": true })).await?;
            tracing::debug!("Marked {} notifications seen for {}", count, profile.id);
        }

        Ok(notifications)
    }

    pub async fn unread_count(&self, actor: Option<&Profile>) -> Result<u64> {
        let profile = require_profile(actor)?;

        let query = Query::table("notifications")
            .eq("user_id", profile.id)
            .eq("vu", false);
        Ok(self.rest.count(&query).await?)
    }

    /// Announce a new event to every volunteer. Returns how many
    /// notifications were written; failures are logged and count as zero.
    pub async fn notify_new_event(&self, title: &str) -> usize {
        let query = Query::table("users")
            .select("id")
            .eq("role", Role::Volunteer.as_wire().unwrap_or_default());

        let volunteers: Vec<UserId> = match self.rest.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to list volunteers for new event notice: {}", e);
                return 0;
            }
        };

        if volunteers.is_empty() {
            return 0;
        }

        let rows: Vec<NewNotification> = volunteers
            .iter()
            .map(|v| NewNotification::new_event(v.id, title))
            .collect();

        match self.rest.insert("notifications", rows.as_slice()).await {
            Ok(()) => {
                tracing::info!("Notified {} volunteers of new event '{}'", rows.len(), title);
                rows.len()
            }
            Err(e) => {
                tracing::warn!("Failed to write new event notifications: {}", e);
                0
            }
        }
    }
}
