//! Text rendering of portal data for the terminal.

use chrono::NaiveDate;
use portal_client::HoursSummary;
use portal_common::{CalendarEntry, Event, Notification, Profile, Role, VolunteerHours};
use uuid::Uuid;

/// `dd/mm/yyyy`, as volunteers read dates.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// `HH:MM` from a stored `HH:MM[:SS]` time; `--:--` when missing.
pub fn format_time(time: Option<&str>) -> String {
    match time {
        Some(t) if !t.is_empty() => t.get(..5).unwrap_or(t).to_string(),
        _ => "--:--".to_string(),
    }
}

pub fn format_hours(hours: f64) -> String {
    let fixed = format!("{:.2}", hours);
    format!("{} h", fixed.trim_end_matches('0').trim_end_matches('.'))
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Volunteer => "volunteer",
        Role::Unset => "no role",
    }
}

pub fn profile(profile: &Profile) -> String {
    format!(
        "{} <{}> ({})",
        profile.display_name(),
        profile.email,
        role_label(profile.role)
    )
}

pub fn seats(event: &Event) -> String {
    match (event.remaining_seats(), event.seats) {
        (Some(0), _) => "full".to_string(),
        (Some(left), Some(total)) => format!("{} seat(s) left of {}", left, total),
        _ => "unlimited seats".to_string(),
    }
}

/// One event block; `viewer` marks events the viewer signed up for.
pub fn event(event: &Event, viewer: Option<Uuid>) -> String {
    let mut lines = Vec::new();

    let mut title = format!("[{}] {}", event.id, event.title);
    if event.urgent {
        title.push_str("  URGENT");
    }
    if event.cancelled {
        title.push_str("  (cancelled)");
    }
    if viewer.is_some_and(|id| event.is_signed_up(id)) {
        title.push_str("  * signed up");
    }
    lines.push(title);

    lines.push(format!(
        "    {} {} - {}  |  {}",
        format_date(event.date),
        format_time(event.start_time.as_deref()),
        format_time(event.end_time.as_deref()),
        seats(event)
    ));

    if let Some(description) = event.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(format!("    {}", description.trim()));
    }

    lines.join("\n")
}

pub fn calendar_entry(entry: &CalendarEntry) -> String {
    format!("{}  [{}] {}", format_date(entry.date), entry.id, entry.title)
}

pub fn roster(event: &Event) -> String {
    let mut lines = vec![format!("{}  [{}] {}", format_date(event.date), event.id, event.title)];
    if event.signups.is_empty() {
        lines.push("    nobody signed up".to_string());
    }
    for signup in &event.signups {
        let name = signup
            .user
            .as_ref()
            .map(|u| u.display_name())
            .unwrap_or_else(|| "(unknown)".to_string());
        lines.push(format!("    - {}", name));
    }
    lines.join("\n")
}

pub fn hours_summary(summary: &HoursSummary) -> String {
    let mut lines: Vec<String> = summary
        .events
        .iter()
        .map(|e| {
            format!(
                "{}  {:<30} {}",
                format_date(e.date),
                e.title,
                format_hours(e.duration_hours())
            )
        })
        .collect();
    lines.push(format!("Total: {}", format_hours(summary.total_hours)));
    lines.join("\n")
}

pub fn volunteer(row: &VolunteerHours) -> String {
    format!(
        "{} {} <{}>  {}",
        row.first_name,
        row.last_name,
        row.email,
        format_hours(row.hours)
    )
}

pub fn notification(n: &Notification) -> String {
    let marker = if n.seen { " " } else { "*" };
    let when = n
        .created_at()
        .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| n.created_at.clone());
    format!("{} {}  {}", marker, when, n.message)
}
