use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::{AccountStatus, User, UserId};
use crate::entities::users;

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: UserId::new(model.id),
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            status: AccountStatus::from_flag(model.is_active),
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            date_joined: model.date_joined,
            last_login: model.last_login,
            updated_at: model.updated_at,
            session_hash: session_hash(&model.password_hash),
        }
    }
}

/// Fields required to insert a new account. Username and email must already
/// be normalized by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user by exact username, active or not
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(&self.conn)
            .await
            .context("Failed to check username")?;

        Ok(count > 0)
    }

    /// Inactive accounts still hold their email.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .count(&self.conn)
            .await
            .context("Failed to check email")?;

        Ok(count > 0)
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<User>> {
        let mut query = users::Entity::find().order_by_asc(users::Column::Username);
        if !include_inactive {
            query = query.filter(users::Column::IsActive.eq(true));
        }

        let rows = query
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn create(&self, new_user: NewUser, config: &SecurityConfig) -> Result<User> {
        let password = new_user.password;
        let config = config.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(new_user.username),
            email: Set(new_user.email),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            password_hash: Set(password_hash),
            is_active: Set(true),
            is_staff: Set(false),
            is_superuser: Set(false),
            date_joined: Set(now.clone()),
            last_login: Set(None),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn update_profile(&self, id: UserId, changes: ProfileChanges) -> Result<User> {
        let user = self.find_model(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.first_name = Set(changes.first_name);
        active.last_name = Set(changes.last_name);
        active.email = Set(changes.email);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update user profile")?;

        Ok(User::from(model))
    }

    /// Clears the active flag. The row is kept.
    pub async fn deactivate(&self, id: UserId) -> Result<()> {
        let user = self.find_model(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(false);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to deactivate user")?;

        Ok(())
    }

    pub async fn touch_last_login(&self, id: UserId) -> Result<()> {
        let user = self.find_model(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.last_login = Set(Some(chrono::Utc::now().to_rfc3339()));
        active
            .update(&self.conn)
            .await
            .context("Failed to record last login")?;

        Ok(())
    }

    /// Returns the user when `password` matches, active or not.
    ///
    /// When the username is unknown and `dummy_hash` is given, the password is
    /// verified against it anyway so the miss costs as much as a wrong password.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(
        &self,
        username: &str,
        password: &str,
        dummy_hash: Option<&str>,
    ) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let password_hash = match (&user, dummy_hash) {
            (Some(u), _) => u.password_hash.clone(),
            (None, Some(hash)) => hash.to_string(),
            (None, None) => return Ok(None),
        };
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || verify_hash(&password, &password_hash))
            .await
            .context("Password verification task panicked")??;

        Ok(user.filter(|_| is_valid).map(User::from))
    }

    /// Stores a new hash and returns the account with its new session hash.
    pub async fn update_password(
        &self,
        id: UserId,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<User> {
        let user = self.find_model(id).await?;

        let password = new_password.to_string();
        let config = config.clone();
        let new_hash = task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .context("Password hashing task panicked")??;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update password")?;

        Ok(User::from(model))
    }

    async fn find_model(&self, id: UserId) -> Result<users::Model> {
        users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))
    }
}

/// Whether `err` was raised by a unique index, i.e. a concurrent writer won
/// the race for a username or email.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DbErr>()
        .and_then(DbErr::sql_err)
        .is_some_and(|e| matches!(e, SqlErr::UniqueConstraintViolation(_)))
}

/// Hash a password using Argon2id with the configured cost params.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Session binding for a stored hash: its PHC salt, which is regenerated on
/// every password change. Empty for an unparsable hash.
#[must_use]
pub fn session_hash(password_hash: &str) -> String {
    PasswordHash::new(password_hash)
        .ok()
        .and_then(|parsed| parsed.salt.map(|salt| salt.as_str().to_string()))
        .unwrap_or_default()
}

/// Params are read back from the PHC string, so hashes made with older
/// settings still verify.
pub fn verify_hash(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            min_password_length: 1,
        }
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse", &fast_config()).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_hash("correct horse", &hash).unwrap());
        assert!(!verify_hash("wrong horse", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_hash("pw", "not-a-phc-string").is_err());
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        let err = anyhow::anyhow!("boom");
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn hash_uses_configured_params() {
        let hash = hash_password("pw", &fast_config()).unwrap();
        assert!(hash.contains("m=64,t=1,p=1"), "{hash}");
    }

    #[test]
    fn session_hash_changes_with_each_hash() {
        let first = hash_password("same password", &fast_config()).unwrap();
        let second = hash_password("same password", &fast_config()).unwrap();

        assert!(!session_hash(&first).is_empty());
        assert_ne!(session_hash(&first), session_hash(&second));
        assert_eq!(session_hash("not-a-phc-string"), "");
    }

    async fn temp_repo() -> UserRepository {
        let path = std::env::temp_dir().join(format!("accounts-repo-{}.db", uuid::Uuid::new_v4()));
        let store = crate::db::Store::new(&format!("sqlite:{}", path.display()))
            .await
            .unwrap();
        UserRepository::new(store.conn)
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            first_name: "anon".to_string(),
            last_name: "nymous".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_a_unique_violation() {
        let repo = temp_repo().await;
        repo.create(new_user("anon", "anon@test.com"), &fast_config())
            .await
            .unwrap();

        let err = repo
            .create(new_user("anon", "other@test.com"), &fast_config())
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err), "{err:#}");

        let err = repo
            .create(new_user("other", "anon@test.com"), &fast_config())
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err), "{err:#}");
    }

    #[tokio::test]
    async fn verify_password_for_unknown_user() {
        let repo = temp_repo().await;
        let dummy = hash_password("dummy", &fast_config()).unwrap();

        let found = repo
            .verify_password("nobody", "dummy", Some(&dummy))
            .await
            .unwrap();
        assert!(found.is_none());

        let found = repo.verify_password("nobody", "dummy", None).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn password_update_changes_session_hash() {
        let repo = temp_repo().await;
        let user = repo
            .create(new_user("anon", "anon@test.com"), &fast_config())
            .await
            .unwrap();

        let updated = repo
            .update_password(user.id, "battery staple", &fast_config())
            .await
            .unwrap();
        assert_ne!(user.session_hash, updated.session_hash);

        let verified = repo
            .verify_password("anon", "battery staple", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(verified.session_hash, updated.session_hash);
    }
}
