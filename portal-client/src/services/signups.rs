use std::sync::Arc;

use portal_common::{Event, NewSignup, OwnSignup, Profile, RecordId};
use serde::Serialize;

use super::events::fetch_event;
use super::{require_profile, require_volunteer};
use crate::error::{Error, Result};
use crate::rest::{Query, RestClient};

const OWN_SIGNUP_COLUMNS: &str =
    "events(id, titre, date, heure_debut, heure_fin, description, urgence, annule)";
const OWN_HOURS_COLUMNS: &str = "events(id, titre, date, heure_debut, heure_fin)";

/// Events a volunteer took part in and their total duration.
#[derive(Debug, Clone, Serialize)]
pub struct HoursSummary {
    pub events: Vec<Event>,
    pub total_hours: f64,
}

impl HoursSummary {
    pub fn from_events(events: Vec<Event>) -> Self {
        let total_hours = events.iter().map(Event::duration_hours).sum();
        Self {
            events,
            total_hours,
        }
    }
}

#[derive(Clone)]
pub struct SignupService {
    rest: Arc<RestClient>,
}

impl SignupService {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    /// Sign the actor up for `event`, as fetched with its signups embedded.
    pub async fn sign_up(&self, actor: Option<&Profile>, event: &Event) -> Result<()> {
        let profile = require_profile(actor)?;

        if event.cancelled {
            return Err(Error::InvalidInput(format!("event '{}' is cancelled", event.title)));
        }
        if event.is_signed_up(profile.id) {
            return Err(Error::AlreadySignedUp(event.id.clone()));
        }
        if event.is_full() {
            return Err(Error::InvalidInput(format!("event '{}' is full", event.title)));
        }

        let existing = Query::table("inscriptions")
            .eq("event_id", &event.id)
            .eq("user_id", profile.id);
        if self.rest.count(&existing).await? > 0 {
            return Err(Error::AlreadySignedUp(event.id.clone()));
        }

        let row = NewSignup {
            event_id: event.id.clone(),
            user_id: profile.id,
        };
        self.rest.insert("inscriptions", &row).await?;
        tracing::info!("User {} signed up for event {}", profile.id, event.id);
        Ok(())
    }

    /// Fetch event `event_id` and sign the actor up for it.
    pub async fn join(&self, actor: Option<&Profile>, event_id: &RecordId) -> Result<Event> {
        require_profile(actor)?;

        let event = fetch_event(&self.rest, event_id).await?;
        self.sign_up(actor, &event).await?;
        Ok(event)
    }

    pub async fn withdraw(&self, actor: Option<&Profile>, event_id: &RecordId) -> Result<()> {
        let profile = require_profile(actor)?;

        let query = Query::table("inscriptions")
            .eq("event_id", event_id)
            .eq("user_id", profile.id);
        self.rest.delete(&query).await?;
        tracing::info!("User {} withdrew from event {}", profile.id, event_id);
        Ok(())
    }

    /// Events the volunteer is signed up for.
    pub async fn mine(&self, actor: Option<&Profile>) -> Result<Vec<Event>> {
        let profile = require_volunteer(actor)?;

        let query = Query::table("inscriptions")
            .select(OWN_SIGNUP_COLUMNS)
            .eq("user_id", profile.id);
        let rows: Vec<OwnSignup> = self.rest.select(&query).await?;
        Ok(rows.into_iter().filter_map(|r| r.event).collect())
    }

    pub async fn my_hours(&self, actor: Option<&Profile>) -> Result<HoursSummary> {
        let profile = require_volunteer(actor)?;

        let query = Query::table("inscriptions")
            .select(OWN_HOURS_COLUMNS)
            .eq("user_id", profile.id);
        let rows: Vec<OwnSignup> = self.rest.select(&query).await?;
        let mut events: Vec<Event> = rows.into_iter().filter_map(|r| r.event).collect();
        events.sort_by_key(|e| e.date);
        Ok(HoursSummary::from_events(events))
    }
}
