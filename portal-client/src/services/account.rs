use std::sync::Arc;

use portal_common::{NewProfileRow, Role};
use serde_json::json;

use crate::auth::{AuthClient, AuthUser, Session, SignUpOutcome};
use crate::error::{Error, Result};
use crate::rest::RestClient;

/// Details entered when creating a volunteer account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Registration {
    fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            return Err(Error::InvalidInput(format!("'{}' is not an email address", self.email)));
        }
        if self.password.is_empty() {
            return Err(Error::InvalidInput("password is required".to_string()));
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(Error::InvalidInput("first and last name are required".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AccountService {
    auth: Arc<AuthClient>,
    rest: Arc<RestClient>,
    reset_redirect_url: Option<String>,
}

impl AccountService {
    pub fn new(auth: Arc<AuthClient>, rest: Arc<RestClient>, reset_redirect_url: Option<String>) -> Self {
        Self {
            auth,
            rest,
            reset_redirect_url,
        }
    }

    /// Create the auth account, then the volunteer's `users` row.
    pub async fn register(&self, registration: &Registration) -> Result<SignUpOutcome> {
        registration.validate()?;

        let role = Role::Volunteer;
        let metadata = json!({
            "prenom": registration.first_name,
            "nom": registration.last_name,
            "role": role.as_wire(),
        });
        let outcome = self
            .auth
            .sign_up(&registration.email, &registration.password, metadata)
            .await?;

        let row = NewProfileRow {
            id: outcome.user().id,
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            role,
        };
        self.rest.upsert("users", &row).await?;
        tracing::info!("Registered volunteer {}", row.id);

        Ok(outcome)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        Ok(self.auth.sign_in_with_password(email, password).await?)
    }

    pub async fn logout(&self) -> Result<()> {
        Ok(self.auth.sign_out().await?)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(Error::InvalidInput("email is required".to_string()));
        }
        self.auth
            .reset_password_for_email(email, self.reset_redirect_url.as_deref())
            .await?;
        Ok(())
    }

    pub async fn update_password(&self, password: &str) -> Result<AuthUser> {
        if password.is_empty() {
            return Err(Error::InvalidInput("password is required".to_string()));
        }
        Ok(self.auth.update_password(password).await?)
    }
}
