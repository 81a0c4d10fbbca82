//! One-shot notifications kept in the session until the next rendered page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::ApiError;
use crate::constants::session::MESSAGES_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub message: String,
}

pub async fn push(
    session: &Session,
    level: MessageLevel,
    message: impl Into<String>,
) -> Result<(), ApiError> {
    let mut queued: Vec<FlashMessage> = session.get(MESSAGES_KEY).await?.unwrap_or_default();
    queued.push(FlashMessage {
        level,
        message: message.into(),
    });
    session.insert(MESSAGES_KEY, queued).await?;
    Ok(())
}

pub async fn success(session: &Session, message: impl Into<String>) -> Result<(), ApiError> {
    push(session, MessageLevel::Success, message).await
}

/// Drains the queue.
pub async fn take(session: &Session) -> Result<Vec<FlashMessage>, ApiError> {
    Ok(session
        .remove::<Vec<FlashMessage>>(MESSAGES_KEY)
        .await?
        .unwrap_or_default())
}
