//! `SeaORM` implementation of the `AccountService` trait.

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::SecurityConfig;
use crate::db::{Store, hash_password, is_unique_violation};
use crate::domain::events::AccountEvent;
use crate::domain::{Principal, User, UserId};
use crate::forms::{CreateUserForm, Credentials, PasswordChangeForm, UpdateUserForm};
use crate::services::account_service::{AccountError, AccountService};

pub struct SeaOrmAccountService {
    store: Store,
    security: SecurityConfig,
    /// Verified against when the username is unknown. Hashed with the same
    /// params as real accounts so both paths cost the same.
    dummy_hash: OnceCell<String>,
}

impl SeaOrmAccountService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self {
            store,
            security,
            dummy_hash: OnceCell::const_new(),
        }
    }

    async fn dummy_hash(&self) -> Result<&str, AccountError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| async {
                let config = self.security.clone();
                tokio::task::spawn_blocking(move || {
                    hash_password("accounts-timing-equalizer", &config)
                })
                .await
                .context("Password hashing task panicked")?
            })
            .await?;
        Ok(hash.as_str())
    }

    fn write_error(err: anyhow::Error) -> AccountError {
        if is_unique_violation(&err) {
            AccountError::Conflict("Username or email has already been taken.".to_string())
        } else {
            AccountError::from(err)
        }
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn register(&self, form: &CreateUserForm) -> Result<User, AccountError> {
        let new_user = form
            .clean(&self.store, self.security.min_password_length)
            .await?;

        let user = self
            .store
            .create_user(new_user, &self.security)
            .await
            .map_err(Self::write_error)?;

        AccountEvent::Registered {
            username: user.username.clone(),
        }
        .record();

        Ok(user)
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<User, AccountError> {
        let dummy_hash = self.dummy_hash().await?;
        let user = self
            .store
            .verify_user_password(&credentials.username, &credentials.password, Some(dummy_hash))
            .await?
            .filter(User::is_active);

        let Some(user) = user else {
            AccountEvent::LoginFailed {
                username: credentials.username.clone(),
            }
            .record();
            return Err(AccountError::InvalidCredentials);
        };

        self.store.touch_last_login(user.id).await?;

        AccountEvent::LoggedIn {
            username: user.username.clone(),
        }
        .record();

        Ok(user)
    }

    async fn session_user(&self, id: UserId) -> Result<Option<User>, AccountError> {
        let user = self.store.get_user_by_id(id).await?;
        Ok(user.filter(User::is_active))
    }

    async fn get_active_user(&self, username: &str) -> Result<User, AccountError> {
        self.store
            .get_user_by_username(username)
            .await?
            .filter(User::is_active)
            .ok_or(AccountError::NotFound)
    }

    async fn get_owned_user(
        &self,
        principal: &Principal,
        username: &str,
    ) -> Result<User, AccountError> {
        if !principal.owns(username) {
            return Err(AccountError::Forbidden);
        }

        self.store
            .get_user_by_username(&username.to_lowercase())
            .await?
            .ok_or(AccountError::NotFound)
    }

    async fn update_profile(
        &self,
        principal: &Principal,
        username: &str,
        form: &UpdateUserForm,
    ) -> Result<User, AccountError> {
        let user = self.get_owned_user(principal, username).await?;

        let changes = form.clean(&self.store, &user.email).await?;

        let updated = self
            .store
            .update_user_profile(user.id, changes)
            .await
            .map_err(Self::write_error)?;

        AccountEvent::ProfileUpdated {
            username: updated.username.clone(),
        }
        .record();

        Ok(updated)
    }

    async fn deactivate(&self, principal: &Principal, username: &str) -> Result<(), AccountError> {
        let user = self.get_owned_user(principal, username).await?;

        self.store.deactivate_user(user.id).await?;

        AccountEvent::Deactivated {
            username: user.username,
        }
        .record();

        Ok(())
    }

    async fn change_password(
        &self,
        principal: &Principal,
        username: &str,
        form: &PasswordChangeForm,
    ) -> Result<User, AccountError> {
        let user = self.get_owned_user(principal, username).await?;

        let new_password = form
            .clean(
                &self.store,
                &user.username,
                self.security.min_password_length,
            )
            .await?;

        let updated = self
            .store
            .update_user_password(user.id, &new_password, &self.security)
            .await?;

        AccountEvent::PasswordChanged {
            username: updated.username.clone(),
        }
        .record();

        Ok(updated)
    }

    async fn find_any(&self, username: &str) -> Result<Option<User>, AccountError> {
        Ok(self
            .store
            .get_user_by_username(&username.to_lowercase())
            .await?)
    }

    async fn list_users(&self, include_inactive: bool) -> Result<Vec<User>, AccountError> {
        Ok(self.store.list_users(include_inactive).await?)
    }
}
