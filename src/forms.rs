//! Input forms for the account views.
//!
//! Each form deserializes from an urlencoded body, then `clean` normalizes the
//! values and collects every problem into [`FormErrors`] keyed by field name.
//! Checks that need the database go through [`UserLookup`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::{NewUser, ProfileChanges};
use crate::services::AccountError;

pub const USERNAME_TAKEN: &str = "Username has already been taken.";
pub const EMAIL_TAKEN: &str = "Email has already been taken.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn’t match.";
pub const OLD_PASSWORD_INCORRECT: &str =
    "Your old password was entered incorrectly. Please enter it again.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const REQUIRED: &str = "This field is required.";

/// Key for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const FIRST_NAME_MAX_LENGTH: usize = 30;
pub const LAST_NAME_MAX_LENGTH: usize = 150;

/// Path segments owned by the router; an account with one of these names
/// could never be reached.
const RESERVED_USERNAMES: &[&str] = &["register", "login", "logout", "metrics"];

static USERNAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").ok());
static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").ok());

/// Field-level validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages for `field`, empty when the field is valid.
    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn non_field(&self) -> &[String] {
        self.field(NON_FIELD_ERRORS)
    }

    fn into_result<T>(self, value: T) -> Result<T, AccountError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(AccountError::Validation(self))
        }
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Store queries the forms need while cleaning.
#[async_trait::async_trait]
pub trait UserLookup: Send + Sync {
    async fn username_taken(&self, username: &str) -> anyhow::Result<bool>;

    async fn email_taken(&self, email: &str) -> anyhow::Result<bool>;

    async fn password_matches(&self, username: &str, password: &str) -> anyhow::Result<bool>;
}

#[async_trait::async_trait]
impl UserLookup for crate::db::Store {
    async fn username_taken(&self, username: &str) -> anyhow::Result<bool> {
        self.username_exists(username).await
    }

    async fn email_taken(&self, email: &str) -> anyhow::Result<bool> {
        self.email_exists(email).await
    }

    async fn password_matches(&self, username: &str, password: &str) -> anyhow::Result<bool> {
        Ok(self
            .verify_user_password(username, password, None)
            .await?
            .is_some())
    }
}

// ============================================================================
// Field cleaning
// ============================================================================

fn clean_text(
    errors: &mut FormErrors,
    field: &str,
    value: &str,
    max_length: usize,
) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    let length = value.chars().count();
    if length > max_length {
        errors.add(
            field,
            format!("Ensure this value has at most {max_length} characters (it has {length})."),
        );
        return None;
    }
    Some(value.to_string())
}

/// Lowercased username, or `None` with the reason recorded.
fn clean_username_format(errors: &mut FormErrors, value: &str) -> Option<String> {
    let username = clean_text(errors, "username", value, USERNAME_MAX_LENGTH)?.to_lowercase();
    let valid = USERNAME_RE
        .as_ref()
        .is_some_and(|re| re.is_match(&username));
    if !valid {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
        return None;
    }
    Some(username)
}

/// Lowercased email, or `None` with the reason recorded.
fn clean_email_format(errors: &mut FormErrors, value: &str) -> Option<String> {
    let email = clean_text(errors, "email", value, EMAIL_MAX_LENGTH)?.to_lowercase();
    let valid = EMAIL_RE.as_ref().is_some_and(|re| re.is_match(&email));
    if !valid {
        errors.add("email", "Enter a valid email address.");
        return None;
    }
    Some(email)
}

/// Passwords are not trimmed.
fn clean_new_password(
    errors: &mut FormErrors,
    first_field: &str,
    second_field: &str,
    first: &str,
    second: &str,
    min_length: usize,
) -> Option<String> {
    if first.is_empty() {
        errors.add(first_field, REQUIRED);
    }
    if second.is_empty() {
        errors.add(second_field, REQUIRED);
    }
    if first.is_empty() || second.is_empty() {
        return None;
    }
    if first != second {
        errors.add(second_field, PASSWORD_MISMATCH);
        return None;
    }
    if second.chars().count() < min_length {
        errors.add(
            second_field,
            format!(
                "This password is too short. It must contain at least {min_length} characters."
            ),
        );
        return None;
    }
    Some(second.to_string())
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl CreateUserForm {
    pub const FIELDS: [&'static str; 6] = [
        "username",
        "password1",
        "password2",
        "first_name",
        "last_name",
        "email",
    ];

    pub async fn clean(
        &self,
        lookup: &dyn UserLookup,
        min_password_length: usize,
    ) -> Result<NewUser, AccountError> {
        let mut errors = FormErrors::new();

        let username = clean_username_format(&mut errors, &self.username);
        if let Some(username) = &username
            && (RESERVED_USERNAMES.contains(&username.as_str())
                || lookup.username_taken(username).await?)
        {
            errors.add("username", USERNAME_TAKEN);
        }

        let email = clean_email_format(&mut errors, &self.email);
        if let Some(email) = &email
            && lookup.email_taken(email).await?
        {
            errors.add("email", EMAIL_TAKEN);
        }

        let first_name = clean_text(
            &mut errors,
            "first_name",
            &self.first_name,
            FIRST_NAME_MAX_LENGTH,
        );
        let last_name = clean_text(
            &mut errors,
            "last_name",
            &self.last_name,
            LAST_NAME_MAX_LENGTH,
        );
        let password = clean_new_password(
            &mut errors,
            "password1",
            "password2",
            &self.password1,
            &self.password2,
            min_password_length,
        );

        match (username, email, first_name, last_name, password) {
            (Some(username), Some(email), Some(first_name), Some(last_name), Some(password)) => {
                errors.into_result(NewUser {
                    username,
                    email,
                    first_name,
                    last_name,
                    password,
                })
            }
            _ => Err(AccountError::Validation(errors)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateUserForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl UpdateUserForm {
    pub const FIELDS: [&'static str; 3] = ["first_name", "last_name", "email"];

    /// Form pre-filled from the stored account.
    #[must_use]
    pub fn initial(user: &crate::domain::User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }

    /// `current_email` is the stored value; keeping it skips the uniqueness
    /// query entirely.
    pub async fn clean(
        &self,
        lookup: &dyn UserLookup,
        current_email: &str,
    ) -> Result<ProfileChanges, AccountError> {
        let mut errors = FormErrors::new();

        let email = clean_email_format(&mut errors, &self.email);
        if let Some(email) = &email
            && email != current_email
            && lookup.email_taken(email).await?
        {
            errors.add("email", EMAIL_TAKEN);
        }

        let first_name = clean_text(
            &mut errors,
            "first_name",
            &self.first_name,
            FIRST_NAME_MAX_LENGTH,
        );
        let last_name = clean_text(
            &mut errors,
            "last_name",
            &self.last_name,
            LAST_NAME_MAX_LENGTH,
        );

        match (first_name, last_name, email) {
            (Some(first_name), Some(last_name), Some(email)) => {
                errors.into_result(ProfileChanges {
                    first_name,
                    last_name,
                    email,
                })
            }
            _ => Err(AccountError::Validation(errors)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// Credentials ready for authentication.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub const FIELDS: [&'static str; 2] = ["username", "password"];

    pub fn clean(&self) -> Result<Credentials, AccountError> {
        let mut errors = FormErrors::new();

        let username = self.username.trim().to_lowercase();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }

        errors.into_result(Credentials {
            username,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub const FIELDS: [&'static str; 3] = ["old_password", "new_password1", "new_password2"];

    /// Returns the new password once the old one has been confirmed for
    /// `username`.
    pub async fn clean(
        &self,
        lookup: &dyn UserLookup,
        username: &str,
        min_password_length: usize,
    ) -> Result<String, AccountError> {
        let mut errors = FormErrors::new();

        if self.old_password.is_empty() {
            errors.add("old_password", REQUIRED);
        } else if !lookup
            .password_matches(username, &self.old_password)
            .await?
        {
            errors.add("old_password", OLD_PASSWORD_INCORRECT);
        }

        let password = clean_new_password(
            &mut errors,
            "new_password1",
            "new_password2",
            &self.new_password1,
            &self.new_password2,
            min_password_length,
        );

        match password {
            Some(password) => errors.into_result(password),
            None => Err(AccountError::Validation(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Users keyed by lowercased username, with (email, password).
    struct FakeLookup {
        users: HashMap<String, (String, String)>,
    }

    impl FakeLookup {
        fn new(users: &[(&str, &str, &str)]) -> Self {
            Self {
                users: users
                    .iter()
                    .map(|(u, e, p)| ((*u).to_string(), ((*e).to_string(), (*p).to_string())))
                    .collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl UserLookup for FakeLookup {
        async fn username_taken(&self, username: &str) -> anyhow::Result<bool> {
            Ok(self.users.contains_key(username))
        }

        async fn email_taken(&self, email: &str) -> anyhow::Result<bool> {
            Ok(self.users.values().any(|(e, _)| e == email))
        }

        async fn password_matches(&self, username: &str, password: &str) -> anyhow::Result<bool> {
            Ok(self.users.get(username).is_some_and(|(_, p)| p == password))
        }
    }

    fn existing() -> FakeLookup {
        FakeLookup::new(&[
            ("anon", "anon@test.com", "password123"),
            ("anon2", "anon2@test.com", "password123"),
        ])
    }

    fn registration(username: &str, email: &str) -> CreateUserForm {
        CreateUserForm {
            username: username.to_string(),
            first_name: "anon".to_string(),
            last_name: "nymous".to_string(),
            email: email.to_string(),
            password1: "password123".to_string(),
            password2: "password123".to_string(),
        }
    }

    fn validation_errors(result: Result<impl std::fmt::Debug, AccountError>) -> FormErrors {
        match result {
            Err(AccountError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn form_field_counts() {
        assert_eq!(CreateUserForm::FIELDS.len(), 6);
        assert_eq!(UpdateUserForm::FIELDS.len(), 3);
    }

    #[tokio::test]
    async fn registration_normalizes_case() {
        let form = registration("NewUser", "New@Test.COM");
        let new_user = form.clean(&existing(), 8).await.unwrap();
        assert_eq!(new_user.username, "newuser");
        assert_eq!(new_user.email, "new@test.com");
        assert_eq!(new_user.password, "password123");
    }

    #[tokio::test]
    async fn registration_rejects_taken_username_in_any_case() {
        for username in ["anon", "ANON", "Anon"] {
            let form = registration(username, "fresh@test.com");
            let errors = validation_errors(form.clean(&existing(), 8).await);
            assert_eq!(errors.field("username"), [USERNAME_TAKEN]);
            assert!(errors.field("email").is_empty());
        }
    }

    #[tokio::test]
    async fn registration_rejects_taken_email_in_any_case() {
        let form = registration("fresh", "ANON@test.com");
        let errors = validation_errors(form.clean(&existing(), 8).await);
        assert_eq!(errors.field("email"), [EMAIL_TAKEN]);
        assert!(errors.field("username").is_empty());
    }

    #[tokio::test]
    async fn registration_rejects_reserved_and_malformed_usernames() {
        let errors = validation_errors(registration("login", "x@test.com").clean(&existing(), 8).await);
        assert_eq!(errors.field("username"), [USERNAME_TAKEN]);

        let errors = validation_errors(registration("bad name", "x@test.com").clean(&existing(), 8).await);
        assert_eq!(errors.field("username").len(), 1);
        assert!(errors.field("username")[0].starts_with("Enter a valid username"));
    }

    #[tokio::test]
    async fn registration_requires_matching_passwords() {
        let mut form = registration("fresh", "fresh@test.com");
        form.password2 = "different123".to_string();
        let errors = validation_errors(form.clean(&existing(), 8).await);
        assert_eq!(errors.field("password2"), [PASSWORD_MISMATCH]);
    }

    #[tokio::test]
    async fn registration_enforces_min_password_length() {
        let mut form = registration("fresh", "fresh@test.com");
        form.password1 = "pw".to_string();
        form.password2 = "pw".to_string();
        let errors = validation_errors(form.clean(&existing(), 8).await);
        assert_eq!(errors.field("password2").len(), 1);

        assert!(form.clean(&existing(), 2).await.is_ok());
    }

    #[tokio::test]
    async fn registration_reports_every_missing_field() {
        let errors = validation_errors(CreateUserForm::default().clean(&existing(), 8).await);
        for field in CreateUserForm::FIELDS {
            assert_eq!(errors.field(field), [REQUIRED], "field {field}");
        }
    }

    #[tokio::test]
    async fn registration_rejects_bad_email() {
        let errors = validation_errors(registration("fresh", "not-an-email").clean(&existing(), 8).await);
        assert_eq!(errors.field("email"), ["Enter a valid email address."]);
    }

    #[tokio::test]
    async fn update_with_unchanged_email_is_valid() {
        let form = UpdateUserForm {
            first_name: "anon".to_string(),
            last_name: "nymous".to_string(),
            email: "anon@test.com".to_string(),
        };
        assert!(form.clean(&existing(), "anon@test.com").await.is_ok());
    }

    #[tokio::test]
    async fn update_with_other_users_email_fails() {
        let form = UpdateUserForm {
            first_name: "anon".to_string(),
            last_name: "nymous".to_string(),
            email: "anon2@test.com".to_string(),
        };
        let errors = validation_errors(form.clean(&existing(), "anon@test.com").await);
        assert_eq!(errors.field("email"), [EMAIL_TAKEN]);
    }

    #[tokio::test]
    async fn update_with_fresh_email_succeeds_lowercased() {
        let form = UpdateUserForm {
            first_name: " anon ".to_string(),
            last_name: "nymous".to_string(),
            email: "New@Test.com".to_string(),
        };
        let changes = form.clean(&existing(), "anon@test.com").await.unwrap();
        assert_eq!(changes.email, "new@test.com");
        assert_eq!(changes.first_name, "anon");
    }

    #[tokio::test]
    async fn update_enforces_name_lengths() {
        let form = UpdateUserForm {
            first_name: "a".repeat(31),
            last_name: "nymous".to_string(),
            email: "anon@test.com".to_string(),
        };
        let errors = validation_errors(form.clean(&existing(), "anon@test.com").await);
        assert_eq!(
            errors.field("first_name"),
            ["Ensure this value has at most 30 characters (it has 31)."]
        );
    }

    #[test]
    fn login_lowercases_username() {
        let form = LoginForm {
            username: " Anon ".to_string(),
            password: "pw".to_string(),
            next: None,
        };
        let credentials = form.clean().unwrap();
        assert_eq!(credentials.username, "anon");

        let errors = validation_errors(LoginForm::default().clean());
        assert_eq!(errors.field("username"), [REQUIRED]);
        assert_eq!(errors.field("password"), [REQUIRED]);
    }

    #[tokio::test]
    async fn password_change_checks_old_password() {
        let form = PasswordChangeForm {
            old_password: "wrong".to_string(),
            new_password1: "newpassword".to_string(),
            new_password2: "newpassword".to_string(),
        };
        let errors = validation_errors(form.clean(&existing(), "anon", 8).await);
        assert_eq!(errors.field("old_password"), [OLD_PASSWORD_INCORRECT]);

        let form = PasswordChangeForm {
            old_password: "password123".to_string(),
            ..form
        };
        assert_eq!(
            form.clean(&existing(), "anon", 8).await.unwrap(),
            "newpassword"
        );
    }

    #[tokio::test]
    async fn password_change_requires_matching_new_passwords() {
        let form = PasswordChangeForm {
            old_password: "password123".to_string(),
            new_password1: "newpassword".to_string(),
            new_password2: "otherpassword".to_string(),
        };
        let errors = validation_errors(form.clean(&existing(), "anon", 8).await);
        assert_eq!(errors.field("new_password2"), [PASSWORD_MISMATCH]);
    }

    #[test]
    fn form_errors_display_joins_messages() {
        let mut errors = FormErrors::new();
        errors.add("email", EMAIL_TAKEN);
        errors.add(NON_FIELD_ERRORS, INVALID_LOGIN);
        assert_eq!(errors.non_field(), [INVALID_LOGIN]);
        assert!(errors.to_string().contains("email: Email has already been taken."));
    }
}
