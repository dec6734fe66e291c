use std::sync::Arc;

use chrono::NaiveDate;
use portal_common::hours::parse_clock;
use portal_common::{CalendarEntry, Event, EventDraft, Profile, RecordId};
use serde_json::json;

use super::{require_admin, today, NotificationService};
use crate::error::{Error, Result};
use crate::rest::{Query, RestClient};

const UPCOMING_COLUMNS: &str = "*, inscriptions(id, user_id, users(id, email, nom, prenom))";
const ROSTER_COLUMNS: &str = "id, titre, date, inscriptions(id, users(prenom, nom))";

#[derive(Clone)]
pub struct EventService {
    rest: Arc<RestClient>,
    notifications: NotificationService,
}

impl EventService {
    pub fn new(rest: Arc<RestClient>, notifications: NotificationService) -> Self {
        Self {
            rest,
            notifications,
        }
    }

    /// Events from today on that are not cancelled, with signups embedded.
    pub async fn upcoming(&self) -> Result<Vec<Event>> {
        self.upcoming_from(today()).await
    }

    pub async fn upcoming_from(&self, from: NaiveDate) -> Result<Vec<Event>> {
        let query = Query::table("events")
            .select(UPCOMING_COLUMNS)
            .gte("date", from)
            .eq("annule", false)
            .order("date", true);
        Ok(self.rest.select(&query).await?)
    }

    /// Calendar entries from today on, cancelled events included.
    pub async fn calendar(&self) -> Result<Vec<CalendarEntry>> {
        self.calendar_from(today()).await
    }

    pub async fn calendar_from(&self, from: NaiveDate) -> Result<Vec<CalendarEntry>> {
        let query = Query::table("events")
            .select("id, titre, date")
            .gte("date", from)
            .order("date", true);
        Ok(self.rest.select(&query).await?)
    }

    pub async fn get(&self, id: &RecordId) -> Result<Event> {
        fetch_event(&self.rest, id).await
    }

    /// Create an event and announce it to volunteers. Returns the number
    /// of notifications written.
    pub async fn create(&self, actor: Option<&Profile>, draft: &EventDraft) -> Result<usize> {
        let admin = require_admin(actor)?;
        validate(draft)?;

        self.rest.insert("events", draft).await?;
        tracing::info!("Event '{}' on {} created by {}", draft.title, draft.date, admin.id);

        Ok(self.notifications.notify_new_event(&draft.title).await)
    }

    pub async fn update(&self, actor: Option<&Profile>, id: &RecordId, draft: &EventDraft) -> Result<()> {
        require_admin(actor)?;
        validate(draft)?;

        let query = Query::table("events").eq("id", id);
        self.rest.update(&query, draft).await?;
        tracing::info!("Event {} updated", id);
        Ok(())
    }

    /// Fetch event `id`, change it with `edit` and save the result.
    pub async fn edit<F>(&self, actor: Option<&Profile>, id: &RecordId, edit: F) -> Result<Event>
    where
        F: FnOnce(EventDraft) -> EventDraft,
    {
        require_admin(actor)?;

        let event = fetch_event(&self.rest, id).await?;
        let draft = edit(EventDraft::from(&event));
        self.update(actor, id, &draft).await?;
        Ok(event)
    }

    pub async fn cancel(&self, actor: Option<&Profile>, id: &RecordId) -> Result<()> {
        require_admin(actor)?;

        let query = Query::table("events").eq("id", id);
        self.rest.update(&query, &json!({ "annule": true })).await?;
        tracing::info!("Event {} cancelled", id);
        Ok(())
    }

    /// All events in date order with the names of who signed up.
    pub async fn rosters(&self, actor: Option<&Profile>) -> Result<Vec<Event>> {
        require_admin(actor)?;

        let query = Query::table("events")
            .select(ROSTER_COLUMNS)
            .order("date", true);
        Ok(self.rest.select(&query).await?)
    }
}

pub(super) async fn fetch_event(rest: &RestClient, id: &RecordId) -> Result<Event> {
    let query = Query::table("events")
        .select(UPCOMING_COLUMNS)
        .eq("id", id);
    rest.select_maybe_single(&query)
        .await?
        .ok_or_else(|| Error::NotFound(format!("event {}", id)))
}

fn validate(draft: &EventDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(Error::InvalidInput("title is required".to_string()));
    }
    for (name, value) in [("start time", &draft.start_time), ("end time", &draft.end_time)] {
        if parse_clock(value).is_none() {
            return Err(Error::InvalidInput(format!("{} must be HH:MM, got '{}'", name, value)));
        }
    }
    Ok(())
}
