use std::sync::Arc;

use portal_common::{hours_by_user, Profile, Role, SignupTimes, VolunteerHours, VolunteerRow};

use super::require_admin;
use crate::error::Result;
use crate::rest::{Query, RestClient};

#[derive(Clone)]
pub struct VolunteerService {
    rest: Arc<RestClient>,
}

impl VolunteerService {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    /// Volunteers by first name, each with the total hours of every event
    /// they signed up for.
    pub async fn with_hours(&self, actor: Option<&Profile>) -> Result<Vec<VolunteerHours>> {
        require_admin(actor)?;

        let volunteers = Query::table("users")
            .select("id, prenom, nom, email")
            .eq("role", Role::Volunteer.as_wire().unwrap_or_default())
            .order("prenom", true);
        let volunteers: Vec<VolunteerRow> = self.rest.select(&volunteers).await?;

        let signups = Query::table("inscriptions").select("user_id, events(heure_debut, heure_fin)");
        let signups: Vec<SignupTimes> = self.rest.select(&signups).await?;

        Ok(combine(volunteers, &signups))
    }
}

fn combine(volunteers: Vec<VolunteerRow>, signups: &[SignupTimes]) -> Vec<VolunteerHours> {
    let totals = hours_by_user(signups);
    volunteers
        .into_iter()
        .map(|v| VolunteerHours {
            hours: totals.get(&v.id).copied().unwrap_or(0.0),
            id: v.id,
            first_name: v.first_name.unwrap_or_default(),
            last_name: v.last_name.unwrap_or_default(),
            email: v.email.unwrap_or_default(),
        })
        .collect()
}
