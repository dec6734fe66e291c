//! Command handlers. Each prints its result to stdout.

use chrono::NaiveDate;
use clap::Args;
use portal_client::{Error, Portal, Registration, Result, SignUpOutcome};
use portal_common::{EventDraft, Profile, RecordId};

use crate::output;

/// Event fields accepted by `admin add` and `admin edit`.
#[derive(Args, Debug, Clone, Default)]
pub struct EventFields {
    /// Event title
    #[arg(long)]
    pub title: Option<String>,

    /// Date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Start time (HH:MM)
    #[arg(long)]
    pub start: Option<String>,

    /// End time (HH:MM)
    #[arg(long)]
    pub end: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Seat limit (0 for unlimited)
    #[arg(long)]
    pub seats: Option<u32>,

    /// Flag the event as urgent
    #[arg(long)]
    pub urgent: Option<bool>,
}

impl EventFields {
    /// Draft for a new event; title, date and times are required.
    pub fn into_new_draft(self) -> Result<EventDraft> {
        let missing = |name: &str| Error::InvalidInput(format!("--{} is required", name));
        Ok(EventDraft {
            title: self.title.ok_or_else(|| missing("title"))?,
            date: self.date.ok_or_else(|| missing("date"))?,
            start_time: self.start.ok_or_else(|| missing("start"))?,
            end_time: self.end.ok_or_else(|| missing("end"))?,
            description: self.description.unwrap_or_default(),
            seats: self.seats,
            urgent: self.urgent.unwrap_or(false),
        })
    }

    /// `base` with the given fields replaced.
    pub fn apply_to(self, mut base: EventDraft) -> EventDraft {
        if let Some(title) = self.title {
            base.title = title;
        }
        if let Some(date) = self.date {
            base.date = date;
        }
        if let Some(start) = self.start {
            base.start_time = start;
        }
        if let Some(end) = self.end {
            base.end_time = end;
        }
        if let Some(description) = self.description {
            base.description = description;
        }
        if self.seats.is_some() {
            base.seats = self.seats;
        }
        if let Some(urgent) = self.urgent {
            base.urgent = urgent;
        }
        base
    }
}

/// Resolve the signed-in user's profile, waiting for the first resolution.
pub async fn current_profile(portal: &Portal) -> Option<Profile> {
    let identity = portal.identity();
    identity.resolved().await.profile
}

pub async fn login(portal: &Portal, email: &str, password: &str) -> Result<()> {
    portal.account.login(email, password).await?;
    match current_profile(portal).await {
        Some(profile) => println!("Signed in as {}", output::profile(&profile)),
        None => println!("Signed in as {}", email),
    }
    Ok(())
}

pub async fn register(portal: &Portal, registration: Registration) -> Result<()> {
    match portal.account.register(&registration).await? {
        SignUpOutcome::SignedIn(_) => println!("Account created, you are signed in."),
        SignUpOutcome::ConfirmationRequired(_) => {
            println!("Account created. Check your email to confirm it, then sign in.")
        }
    }
    Ok(())
}

pub async fn logout(portal: &Portal) -> Result<()> {
    portal.account.logout().await?;
    portal.cache.write(None);
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(portal: &Portal) -> Result<()> {
    match current_profile(portal).await {
        Some(profile) => println!("{}", output::profile(&profile)),
        None => println!("Not signed in."),
    }
    Ok(())
}

pub async fn reset_password(portal: &Portal, email: &str) -> Result<()> {
    portal.account.request_password_reset(email).await?;
    println!("If an account exists for {}, a reset link is on its way.", email);
    Ok(())
}

pub async fn update_password(portal: &Portal, password: &str) -> Result<()> {
    portal.account.update_password(password).await?;
    println!("Password updated.");
    Ok(())
}

pub async fn events(portal: &Portal) -> Result<()> {
    let viewer = current_profile(portal).await.map(|p| p.id);
    let events = portal.events.upcoming().await?;
    if events.is_empty() {
        println!("No upcoming events.");
    }
    for event in &events {
        println!("{}\n", output::event(event, viewer));
    }
    Ok(())
}

pub async fn calendar(portal: &Portal) -> Result<()> {
    for entry in portal.events.calendar().await? {
        println!("{}", output::calendar_entry(&entry));
    }
    Ok(())
}

pub async fn join(portal: &Portal, event_id: &RecordId) -> Result<()> {
    let profile = current_profile(portal).await;
    let event = portal.signups.join(profile.as_ref(), event_id).await?;
    println!("Signed up for '{}' on {}.", event.title, output::format_date(event.date));
    Ok(())
}

pub async fn leave(portal: &Portal, event_id: &RecordId) -> Result<()> {
    let profile = current_profile(portal).await;
    portal.signups.withdraw(profile.as_ref(), event_id).await?;
    println!("Withdrawn from event {}.", event_id);
    Ok(())
}

pub async fn my_signups(portal: &Portal) -> Result<()> {
    let profile = current_profile(portal).await;
    let events = portal.signups.mine(profile.as_ref()).await?;
    if events.is_empty() {
        println!("You are not signed up for any event.");
    }
    for event in &events {
        println!("{}\n", output::event(event, None));
    }
    Ok(())
}

pub async fn my_hours(portal: &Portal) -> Result<()> {
    let profile = current_profile(portal).await;
    let summary = portal.signups.my_hours(profile.as_ref()).await?;
    println!("{}", output::hours_summary(&summary));
    Ok(())
}

pub async fn notifications(portal: &Portal) -> Result<()> {
    let profile = current_profile(portal).await;
    let notifications = portal.notifications.list_and_mark_seen(profile.as_ref()).await?;
    if notifications.is_empty() {
        println!("No notifications.");
    }
    for n in &notifications {
        println!("{}", output::notification(n));
    }
    Ok(())
}

pub async fn unread(portal: &Portal) -> Result<()> {
    let profile = current_profile(portal).await;
    let count = portal.notifications.unread_count(profile.as_ref()).await?;
    println!("{}", count);
    Ok(())
}

pub async fn admin_add(portal: &Portal, fields: EventFields) -> Result<()> {
    let profile = current_profile(portal).await;
    let draft = fields.into_new_draft()?;
    let notified = portal.events.create(profile.as_ref(), &draft).await?;
    println!("Event '{}' added, {} volunteer(s) notified.", draft.title, notified);
    Ok(())
}

pub async fn admin_edit(portal: &Portal, event_id: &RecordId, fields: EventFields) -> Result<()> {
    let profile = current_profile(portal).await;
    portal
        .events
        .edit(profile.as_ref(), event_id, |draft| fields.apply_to(draft))
        .await?;
    println!("Event {} updated.", event_id);
    Ok(())
}

pub async fn admin_cancel(portal: &Portal, event_id: &RecordId) -> Result<()> {
    let profile = current_profile(portal).await;
    portal.events.cancel(profile.as_ref(), event_id).await?;
    println!("Event {} cancelled.", event_id);
    Ok(())
}

pub async fn admin_rosters(portal: &Portal) -> Result<()> {
    let profile = current_profile(portal).await;
    for event in portal.events.rosters(profile.as_ref()).await? {
        println!("{}", output::roster(&event));
    }
    Ok(())
}

pub async fn admin_volunteers(portal: &Portal) -> Result<()> {
    let profile = current_profile(portal).await;
    for row in portal.volunteers.with_hours(profile.as_ref()).await? {
        println!("{}", output::volunteer(&row));
    }
    Ok(())
}
