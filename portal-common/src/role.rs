//! Roles governing what a profile may do in the portal.

use serde::{Deserialize, Serialize};

/// Application-level role of a user.
///
/// The backend stores roles as free strings; anything outside the known
/// spellings maps to [`Role::Unset`] rather than being guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Role {
    /// Creates, edits and cancels events, sees rosters and volunteer hours
    Admin,
    /// Signs up for events and tracks their own hours
    Volunteer,
    /// No role supplied yet (fresh account, missing row or unknown value)
    #[default]
    Unset,
}

impl Role {
    /// All role variants for iteration.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Volunteer, Role::Unset];

    /// Parse a role as stored by the backend.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "admin" => Role::Admin,
            "benevole" | "bénévole" | "volunteer" => Role::Volunteer,
            _ => Role::Unset,
        }
    }

    /// Spelling written back to the `users` relation.
    pub fn as_wire(&self) -> Option<&'static str> {
        match self {
            Role::Admin => Some("admin"),
            Role::Volunteer => Some("benevole"),
            Role::Unset => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Role::Unset)
    }
}

impl From<Option<String>> for Role {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Role::parse).unwrap_or_default()
    }
}

impl From<Role> for Option<String> {
    fn from(role: Role) -> Self {
        role.as_wire().map(String::from)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Volunteer => write!(f, "volunteer"),
            Role::Unset => write!(f, "unset"),
        }
    }
}
