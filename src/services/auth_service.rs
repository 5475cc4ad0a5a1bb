//! Domain service for authentication and user management.
//!
//! Handles login, bearer-session resolution, and the admin-only user CRUD.

use serde::Serialize;
use thiserror::Error;

use crate::config::AdminSeedConfig;
use crate::models::{User, UserRole};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User {0} not found")]
    UserNotFound(i32),

    #[error("Username '{0}' already exists")]
    DuplicateUsername(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Requires role {0}")]
    Forbidden(UserRole),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Login result containing the new bearer token and the user it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: User,
}

/// Capability check applied at the top of privileged handlers.
/// Admins satisfy every role requirement.
pub fn require_role(user: &User, required: UserRole) -> Result<(), AuthError> {
    if user.role == required || user.is_admin() {
        Ok(())
    } else {
        Err(AuthError::Forbidden(required))
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and opens a new session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for blank input and
    /// [`AuthError::InvalidCredentials`] if the user is unknown or the password is wrong.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Returns the owner of an unexpired session, `None` otherwise.
    async fn resolve_user(&self, token: &str) -> Result<Option<User>, AuthError>;

    /// Deletes a session. Unknown tokens are ignored.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    async fn list_users(&self) -> Result<Vec<User>, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateUsername`] if the username is taken.
    async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError>;

    /// Changes role and/or password. Blank passwords are ignored.
    async fn update_user(
        &self,
        id: i32,
        role: Option<UserRole>,
        password: Option<&str>,
    ) -> Result<User, AuthError>;

    /// Deletes a user and, through the foreign key, their sessions.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] when `actor` tries to delete itself.
    async fn delete_user(&self, actor: &User, id: i32) -> Result<(), AuthError>;

    /// Creates the configured administrator when no users exist yet.
    /// Returns true if a user was created.
    async fn seed_admin(&self, seed: &AdminSeedConfig) -> Result<bool, AuthError>;
}
