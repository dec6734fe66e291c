//! Application-level user profile and the rows it is built from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

/// Profile of the signed-in user, as used for authorization in the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Always the id of the session the profile was resolved from
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Profile {
    /// Build a profile from the `users` relation row of the session's user.
    pub fn from_row(id: Uuid, email: Option<&str>, row: ProfileRow) -> Self {
        Self {
            id,
            email: email.unwrap_or_default().to_string(),
            role: row.role,
            first_name: row.first_name.unwrap_or_default(),
            last_name: row.last_name.unwrap_or_default(),
        }
    }

    /// Build a profile from the metadata carried on the session, used while
    /// the `users` row has not been written yet.
    pub fn from_metadata(
        id: Uuid,
        email: Option<&str>,
        metadata: &HashMap<String, serde_json::Value>,
    ) -> Self {
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| metadata.get(*k).and_then(|v| v.as_str()))
                .unwrap_or_default()
                .to_string()
        };

        let role = metadata
            .get("role")
            .and_then(|v| v.as_str())
            .map(Role::parse)
            .unwrap_or_default();

        Self {
            id,
            email: email.unwrap_or_default().to_string(),
            role,
            first_name: text(&["prenom", "first_name"]),
            last_name: text(&["nom", "last_name"]),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    pub fn is_volunteer(&self) -> bool {
        matches!(self.role, Role::Volunteer)
    }

    /// "First Last", or the email when no name is known.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Columns of the `users` relation read when resolving a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRow {
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "prenom", default)]
    pub first_name: Option<String>,
    #[serde(rename = "nom", default)]
    pub last_name: Option<String>,
}

/// Row written to the `users` relation when an account is registered.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfileRow {
    pub id: Uuid,
    #[serde(rename = "prenom")]
    pub first_name: String,
    #[serde(rename = "nom")]
    pub last_name: String,
    pub role: Role,
}

/// A volunteer as listed for admins.
#[derive(Debug, Clone, Deserialize)]
pub struct VolunteerRow {
    pub id: Uuid,
    #[serde(rename = "prenom", default)]
    pub first_name: Option<String>,
    #[serde(rename = "nom", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
