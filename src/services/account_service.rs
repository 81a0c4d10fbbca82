//! Domain service for account management.
//!
//! Covers registration, authentication, profile reads and the owner-only
//! mutations (profile update, deactivation, password change).

use thiserror::Error;

use crate::domain::{Principal, User, UserId};
use crate::forms::{
    CreateUserForm, Credentials, FormErrors, PasswordChangeForm, UpdateUserForm,
};

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0}")]
    Validation(FormErrors),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    NotFound,

    /// Also returned when the target account does not exist, so callers
    /// cannot probe for usernames through the owner-only operations.
    #[error("Permission denied")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Domain service trait for accounts.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Validates the registration form and creates an active account.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] for field errors and
    /// [`AccountError::Conflict`] if a concurrent registration took the
    /// username or email first.
    async fn register(&self, form: &CreateUserForm) -> Result<User, AccountError>;

    /// Verifies credentials of an active account and records the login.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidCredentials`] for a wrong password, an
    /// unknown username, or an inactive account alike.
    async fn authenticate(&self, credentials: &Credentials) -> Result<User, AccountError>;

    /// Resolves a session's user id. Inactive or removed accounts yield `None`.
    async fn session_user(&self, id: UserId) -> Result<Option<User>, AccountError>;

    /// Public profile lookup by exact username.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] when no such user exists or the
    /// account is inactive.
    async fn get_active_user(&self, username: &str) -> Result<User, AccountError>;

    /// Loads `username`'s account on behalf of its owner.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Forbidden`] unless `principal` owns the account.
    async fn get_owned_user(
        &self,
        principal: &Principal,
        username: &str,
    ) -> Result<User, AccountError>;

    async fn update_profile(
        &self,
        principal: &Principal,
        username: &str,
        form: &UpdateUserForm,
    ) -> Result<User, AccountError>;

    /// Marks the account inactive. The record is kept.
    async fn deactivate(&self, principal: &Principal, username: &str) -> Result<(), AccountError>;

    /// Returns the account with its new session hash; sessions bound to the
    /// old one no longer authenticate.
    async fn change_password(
        &self,
        principal: &Principal,
        username: &str,
        form: &PasswordChangeForm,
    ) -> Result<User, AccountError>;

    /// Lookup for internal tooling; returns inactive accounts too.
    async fn find_any(&self, username: &str) -> Result<Option<User>, AccountError>;

    async fn list_users(&self, include_inactive: bool) -> Result<Vec<User>, AccountError>;
}
