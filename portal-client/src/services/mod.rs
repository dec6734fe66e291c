//! Domain operations on top of the auth and data clients.
//!
//! Guarded operations take the acting [`Profile`] (as resolved by the
//! identity resolver) and check its role before touching the backend.

mod account;
mod events;
mod notifications;
mod signups;
mod volunteers;

pub use account::{AccountService, Registration};
pub use events::EventService;
pub use notifications::NotificationService;
pub use signups::{HoursSummary, SignupService};
pub use volunteers::VolunteerService;

use chrono::{Local, NaiveDate};
use portal_common::{Profile, Role};

use crate::error::{Error, Result};

/// A signed-in user with any profile.
pub(crate) fn require_profile(actor: Option<&Profile>) -> Result<&Profile> {
    actor.ok_or(Error::NotSignedIn)
}

pub(crate) fn require_admin(actor: Option<&Profile>) -> Result<&Profile> {
    let profile = require_profile(actor)?;
    match profile.role {
        Role::Admin => Ok(profile),
        Role::Volunteer | Role::Unset => {
            Err(Error::Forbidden("admin role required".to_string()))
        }
    }
}

pub(crate) fn require_volunteer(actor: Option<&Profile>) -> Result<&Profile> {
    let profile = require_profile(actor)?;
    match profile.role {
        Role::Volunteer => Ok(profile),
        Role::Admin | Role::Unset => {
            Err(Error::Forbidden("volunteer role required".to_string()))
        }
    }
}

/// Today's date in local time; upcoming views start here.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}
