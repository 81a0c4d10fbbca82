use serde::Serialize;

use crate::domain::User;
use crate::forms::FormErrors;

use super::messages::FlashMessage;
use super::urls::Urls;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-field validation messages of a rejected form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FormErrors>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: None,
        }
    }

    pub fn form_error(message: impl Into<String>, errors: FormErrors) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: Some(errors),
        }
    }
}

/// What a view would hand to its template.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub template: &'static str,
    pub context: T,
    pub messages: Vec<FlashMessage>,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub username: String,
    /// Only shown to the account owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub date_joined: String,
    pub url: String,
}

impl UserDto {
    #[must_use]
    pub fn new(user: &User, url: String, show_email: bool) -> Self {
        Self {
            username: user.username.clone(),
            email: show_email.then(|| user.email.clone()),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            date_joined: user.date_joined.clone(),
            url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormContext {
    pub fields: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetailContext {
    pub object: UserDto,
    pub is_owner: bool,
    /// Account actions, present only on the owner's own page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<OwnerLinks>,
}

#[derive(Debug, Serialize)]
pub struct OwnerLinks {
    pub update_account: String,
    pub delete_account: String,
    pub change_password: String,
    pub logout: String,
}

impl OwnerLinks {
    #[must_use]
    pub fn new(urls: &Urls, username: &str) -> Self {
        Self {
            update_account: urls.update_account(username),
            delete_account: urls.delete_account(username),
            change_password: urls.change_password(username),
            logout: urls.logout(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateContext {
    pub object: UserDto,
    pub fields: &'static [&'static str],
    pub form: crate::forms::UpdateUserForm,
}

#[derive(Debug, Serialize)]
pub struct PasswordChangeContext {
    pub username: String,
    pub fields: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct LoggedOutContext {}
