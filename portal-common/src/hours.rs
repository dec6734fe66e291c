//! Volunteer hour arithmetic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parse a wall-clock time (`HH:MM` or `HH:MM:SS`) into minutes after midnight.
pub fn parse_clock(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Length of a shift in hours. Missing or malformed times count as zero,
/// as does an end before the start.
pub fn duration_hours(start: Option<&str>, end: Option<&str>) -> f64 {
    match (start.and_then(parse_clock), end.and_then(parse_clock)) {
        (Some(s), Some(e)) if e > s => f64::from(e - s) / 60.0,
        _ => 0.0,
    }
}

/// Start and end times of an event embedded in a signup row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventTimes {
    #[serde(rename = "heure_debut", default)]
    pub start_time: Option<String>,
    #[serde(rename = "heure_fin", default)]
    pub end_time: Option<String>,
}

impl EventTimes {
    pub fn hours(&self) -> f64 {
        duration_hours(self.start_time.as_deref(), self.end_time.as_deref())
    }
}

/// A signup row with the times of its event, used to total hours per user.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupTimes {
    pub user_id: Uuid,
    #[serde(rename = "events", default, deserialize_with = "crate::embed::one")]
    pub event: Option<EventTimes>,
}

/// Sum event durations per user.
pub fn hours_by_user<'a>(signups: impl IntoIterator<Item = &'a SignupTimes>) -> HashMap<Uuid, f64> {
    let mut totals = HashMap::new();
    for signup in signups {
        let Some(event) = &signup.event else {
            continue;
        };
        *totals.entry(signup.user_id).or_insert(0.0) += event.hours();
    }
    totals
}

/// A volunteer together with their accumulated hours.
#[derive(Debug, Clone, Serialize)]
pub struct VolunteerHours {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hours: f64,
}
