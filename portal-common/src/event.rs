//! Events, signups and the payloads used to write them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hours::duration_hours;
use crate::id::RecordId;

/// An event row, optionally with its signups embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: RecordId,
    #[serde(rename = "titre")]
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "heure_debut", default)]
    pub start_time: Option<String>,
    #[serde(rename = "heure_fin", default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Seat limit; `None` or zero means unlimited
    #[serde(rename = "nb_places", default)]
    pub seats: Option<u32>,
    #[serde(rename = "urgence", default)]
    pub urgent: bool,
    #[serde(rename = "annule", default)]
    pub cancelled: bool,
    #[serde(rename = "inscriptions", default, skip_serializing_if = "Vec::is_empty")]
    pub signups: Vec<EventSignup>,
}

impl Event {
    pub fn duration_hours(&self) -> f64 {
        duration_hours(self.start_time.as_deref(), self.end_time.as_deref())
    }

    /// Whether the given user appears among the embedded signups.
    pub fn is_signed_up(&self, user_id: Uuid) -> bool {
        self.signups.iter().any(|s| s.belongs_to(user_id))
    }

    /// Seats left, `None` when the event has no limit.
    pub fn remaining_seats(&self) -> Option<u32> {
        self.seats
            .filter(|&seats| seats > 0)
            .map(|seats| seats.saturating_sub(self.signups.len() as u32))
    }

    pub fn is_full(&self) -> bool {
        self.remaining_seats() == Some(0)
    }
}

/// A signup embedded in an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSignup {
    pub id: RecordId,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(rename = "users", default, deserialize_with = "crate::embed::one")]
    pub user: Option<SignedUpUser>,
}

impl EventSignup {
    pub fn belongs_to(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id) || self.user.as_ref().and_then(|u| u.id) == Some(user_id)
    }
}

/// The user behind a signup, as embedded from the `users` relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUpUser {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "prenom", default)]
    pub first_name: Option<String>,
    #[serde(rename = "nom", default)]
    pub last_name: Option<String>,
}

impl SignedUpUser {
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        if name.is_empty() {
            self.email.clone().unwrap_or_default()
        } else {
            name.to_string()
        }
    }
}

/// Minimal event projection for the calendar.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEntry {
    pub id: RecordId,
    #[serde(rename = "titre")]
    pub title: String,
    pub date: NaiveDate,
}

/// A signup of the current user with its event embedded.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnSignup {
    #[serde(rename = "events", default, deserialize_with = "crate::embed::one")]
    pub event: Option<Event>,
}

/// Row inserted to sign a user up for an event.
#[derive(Debug, Clone, Serialize)]
pub struct NewSignup {
    pub event_id: RecordId,
    pub user_id: Uuid,
}

/// Fields an admin fills in to create or edit an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    #[serde(rename = "titre")]
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "heure_debut")]
    pub start_time: String,
    #[serde(rename = "heure_fin")]
    pub end_time: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "nb_places")]
    pub seats: Option<u32>,
    #[serde(rename = "urgence", default)]
    pub urgent: bool,
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            date: event.date,
            start_time: event.start_time.clone().unwrap_or_default(),
            end_time: event.end_time.clone().unwrap_or_default(),
            description: event.description.clone().unwrap_or_default(),
            seats: event.seats,
            urgent: event.urgent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_json(signups: serde_json::Value) -> serde_json::Value {
        json!({
            "id": 7,
            "titre": "Atelier cuisine",
            "date": "2026-11-02",
            "heure_debut": "10:00:00",
            "heure_fin": "12:30:00",
            "description": null,
            "nb_places": 2,
            "urgence": true,
            "annule": false,
            "inscriptions": signups
        })
    }

    #[test]
    fn test_event_deserialization_with_embedded_users() {
        let user = Uuid::new_v4();
        let event: Event = serde_json::from_value(event_json(json!([
            {"id": 1, "user_id": user, "users": {"id": user, "email": "a@b.fr", "prenom": "A", "nom": "B"}}
        ])))
        .unwrap();

        assert_eq!(event.id.as_str(), "7");
        assert_eq!(event.title, "Atelier cuisine");
        assert!(event.description.is_none());
        assert_eq!(event.duration_hours(), 2.5);
        assert!(event.is_signed_up(user));
        assert!(!event.is_signed_up(Uuid::new_v4()));
        assert_eq!(event.signups[0].user.as_ref().unwrap().display_name(), "A B");
    }

    #[test]
    fn test_event_signup_matched_through_embedded_user_only() {
        let user = Uuid::new_v4();
        let event: Event = serde_json::from_value(event_json(json!([
            {"id": 1, "users": {"id": user, "prenom": "A", "nom": "B"}}
        ])))
        .unwrap();
        assert!(event.is_signed_up(user));
    }

    #[test]
    fn test_event_remaining_seats() {
        let event: Event = serde_json::from_value(event_json(json!([
            {"id": 1, "user_id": Uuid::new_v4()},
            {"id": 2, "user_id": Uuid::new_v4()}
        ])))
        .unwrap();
        assert_eq!(event.remaining_seats(), Some(0));
        assert!(event.is_full());

        let mut open = event.clone();
        open.seats = None;
        assert_eq!(open.remaining_seats(), None);
        assert!(!open.is_full());

        open.seats = Some(0);
        assert_eq!(open.remaining_seats(), None);
        assert!(!open.is_full());
    }

    #[test]
    fn test_event_minimal_projection() {
        let event: Event =
            serde_json::from_value(json!({"id": "e1", "titre": "Repas", "date": "2026-12-24"}))
                .unwrap();
        assert!(event.signups.is_empty());
        assert_eq!(event.duration_hours(), 0.0);
        assert!(!event.cancelled);
    }

    #[test]
    fn test_event_draft_wire_format() {
        let draft = EventDraft {
            title: "Repas".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
            start_time: "18:00".to_string(),
            end_time: "22:00".to_string(),
            description: String::new(),
            seats: None,
            urgent: false,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["titre"], "Repas");
        assert_eq!(value["date"], "2026-12-24");
        assert_eq!(value["heure_debut"], "18:00");
        assert!(value["nb_places"].is_null());
        assert_eq!(value["urgence"], false);
    }

    #[test]
    fn test_own_signup_accepts_array_embedding() {
        let row: OwnSignup = serde_json::from_value(json!({
            "events": [{"id": 3, "titre": "Tri", "date": "2026-10-30"}]
        }))
        .unwrap();
        assert_eq!(row.event.unwrap().title, "Tri");
    }
}
