//! Account lifecycle events.
//!
//! Every state change performed by the account service is recorded here as a
//! structured log line and a counter, so both the log stream and `/metrics`
//! see the same event names.

use serde::Serialize;
use tracing::info;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum AccountEvent {
    Registered { username: String },
    LoggedIn { username: String },
    LoginFailed { username: String },
    ProfileUpdated { username: String },
    Deactivated { username: String },
    PasswordChanged { username: String },
}

impl AccountEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::LoggedIn { .. } => "logged_in",
            Self::LoginFailed { .. } => "login_failed",
            Self::ProfileUpdated { .. } => "profile_updated",
            Self::Deactivated { .. } => "deactivated",
            Self::PasswordChanged { .. } => "password_changed",
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Registered { username }
            | Self::LoggedIn { username }
            | Self::LoginFailed { username }
            | Self::ProfileUpdated { username }
            | Self::Deactivated { username }
            | Self::PasswordChanged { username } => username,
        }
    }

    pub fn record(&self) {
        metrics::counter!("accounts_events_total", "event" => self.name()).increment(1);
        info!(
            event = self.name(),
            username = %self.username(),
            "Account event"
        );
    }
}
