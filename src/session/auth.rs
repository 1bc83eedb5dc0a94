//! Login, registration and the forms behind them.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use super::{Session, SessionManager, SessionStore, SessionStoreError, User};
use crate::api::{ApiError, AuthResponse, StorefrontApi};
use crate::domain::value_objects::{email_address, required, summarize, Role};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", summarize(.0))]
    Invalid(ValidationErrors),

    /// Server message shown verbatim, or a generic fallback.
    #[error("{0}")]
    Rejected(String),

    #[error("Failed to establish secure connection")]
    SecureConnection(#[source] ApiError),

    #[error("Failed to save session: {0}")]
    Storage(#[from] SessionStoreError),
}

impl AuthError {
    pub fn field_errors(&self) -> Option<&ValidationErrors> {
        match self { Self::Invalid(errors) => Some(errors), _ => None }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Validate)]
pub struct Credentials {
    #[validate(custom = "email_address")]
    pub email: String,
    #[validate(custom = "password_present")]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("email", &self.email).field("password", &"[REDACTED]").finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Validate)]
pub struct Registration {
    #[validate(custom = "name_present")]
    pub name: String,
    #[validate(custom = "email_address")]
    pub email: String,
    #[validate(custom = "new_password")]
    pub password: String,
    pub password_confirmation: String,
    pub role: Role,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("password_confirmation", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

impl Registration {
    /// Field checks plus the cross-field confirmation match.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_else(ValidationErrors::new);
        if self.password != self.password_confirmation {
            let mut error = ValidationError::new("must_match");
            error.message = Some("Passwords do not match".into());
            errors.add("password_confirmation", error);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn account_holder(&self) -> User {
        User { id: None, name: self.name.trim().to_string(), email: self.email.trim().to_string(), role: self.role }
    }
}

fn password_present(value: &str) -> Result<(), ValidationError> { required(value, "Password is required") }

fn name_present(value: &str) -> Result<(), ValidationError> { required(value, "Name is required") }

fn new_password(value: &str) -> Result<(), ValidationError> {
    password_present(value)?;
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        let mut error = ValidationError::new("length");
        error.message = Some("Password must be at least 8 characters".into());
        return Err(error);
    }
    Ok(())
}

impl<S: SessionStore> SessionManager<S> {
    /// Exchanges credentials for a token and persists the session.
    pub async fn login(&mut self, api: &dyn StorefrontApi, credentials: &Credentials) -> Result<&Session, AuthError> {
        credentials.validate().map_err(AuthError::Invalid)?;

        let response = api.login(credentials).await.map_err(|e| {
            tracing::warn!(email = %credentials.email, error = %e, "login rejected");
            AuthError::Rejected(e.message_or("Login failed"))
        })?;
        let AuthResponse { token, user } = response;
        let user = match user {
            Some(user) if !token.trim().is_empty() => user,
            _ => return Err(AuthError::Rejected("Login failed".to_string())),
        };

        Ok(self.establish(Session::new(token, user))?)
    }

    /// Fetches the security cookie, then registers. A cookie failure stops
    /// the sequence before the registration request is sent.
    pub async fn register(
        &mut self,
        api: &dyn StorefrontApi,
        registration: &Registration,
    ) -> Result<&Session, AuthError> {
        registration.check().map_err(AuthError::Invalid)?;

        if let Err(e) = api.csrf_cookie().await {
            tracing::warn!(error = %e, "security cookie request failed");
            return Err(AuthError::SecureConnection(e));
        }

        let response = api.register(registration).await.map_err(|e| {
            tracing::warn!(email = %registration.email, error = %e, "registration rejected");
            AuthError::Rejected(e.message_or("Registration failed"))
        })?;
        if response.token.trim().is_empty() {
            tracing::warn!(email = %registration.email, "registration response carried no token");
            return Err(AuthError::Rejected("Registration failed".to_string()));
        }
        let user = response.user.unwrap_or_else(|| registration.account_holder());

        Ok(self.establish(Session::new(response.token, user))?)
    }
}
