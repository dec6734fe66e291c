//! Volunteer Portal Common Types
//!
//! Shared types used by the portal client library and the command-line front-end.

pub mod embed;
pub mod event;
pub mod hours;
pub mod id;
pub mod notification;
pub mod profile;
pub mod role;

pub use event::{CalendarEntry, Event, EventDraft, EventSignup, NewSignup, OwnSignup, SignedUpUser};
pub use hours::{duration_hours, hours_by_user, EventTimes, SignupTimes, VolunteerHours};
pub use id::RecordId;
pub use notification::{NewNotification, Notification, NEW_EVENT_KIND};
pub use profile::{NewProfileRow, Profile, ProfileRow, VolunteerRow};
pub use role::Role;
