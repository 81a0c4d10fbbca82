//! Reverse routing for the account views, relative to the mount path.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

#[derive(Debug, Clone)]
pub struct Urls {
    base: String,
}

impl Urls {
    #[must_use]
    pub fn new(mount_path: &str) -> Self {
        Self {
            base: mount_path.trim_end_matches('/').to_string(),
        }
    }

    /// Prefix without trailing slash; empty when mounted at `/`.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn login(&self) -> String {
        format!("{}/login/", self.base)
    }

    #[must_use]
    pub fn logout(&self) -> String {
        format!("{}/logout/", self.base)
    }

    #[must_use]
    pub fn redirect(&self) -> String {
        format!("{}/~redirect/", self.base)
    }

    #[must_use]
    pub fn detail(&self, username: &str) -> String {
        format!("{}/{}/", self.base, urlencoding::encode(username))
    }

    #[must_use]
    pub fn update_account(&self, username: &str) -> String {
        format!("{}update-account/", self.detail(username))
    }

    #[must_use]
    pub fn delete_account(&self, username: &str) -> String {
        format!("{}delete-account/", self.detail(username))
    }

    #[must_use]
    pub fn change_password(&self, username: &str) -> String {
        format!("{}change-password/", self.detail(username))
    }

    /// Login URL that sends the user back to `next` afterwards. Slashes in
    /// `next` stay readable.
    #[must_use]
    pub fn login_with_next(&self, next: &str) -> String {
        let encoded = urlencoding::encode(next).replace("%2F", "/");
        format!("{}?next={}", self.login(), encoded)
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
