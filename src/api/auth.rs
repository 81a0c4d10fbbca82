use axum::{
    Extension, Form, Json,
    extract::{FromRequestParts, OriginalUri, Path, Query, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::types::{FormContext, LoggedOutContext, Page};
use super::urls::found;
use super::validation::safe_next;
use super::{ApiError, ApiResponse, AppState, messages};
use crate::constants::{
    session::{USER_HASH_KEY, USER_ID_KEY},
    templates,
};
use crate::domain::{Principal, User, UserId};
use crate::forms::LoginForm;

// ============================================================================
// Request-scoped authentication
// ============================================================================

/// The acting user of a request, if any. Resolved from the session once per
/// request; inactive accounts resolve to `None`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Principal>);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(Self(Some(principal.clone())));
        }

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError::internal(msg))?;

        let principal = resolve_principal(state, &session).await?;
        if let Some(principal) = &principal {
            parts.extensions.insert(principal.clone());
        }
        Ok(Self(principal))
    }
}

/// A session whose stored hash no longer matches the account (the password
/// changed since login) is flushed and treated as anonymous.
async fn resolve_principal(
    state: &AppState,
    session: &Session,
) -> Result<Option<Principal>, ApiError> {
    let Some(user_id) = session.get::<i32>(USER_ID_KEY).await? else {
        return Ok(None);
    };

    let Some(user) = state.accounts().session_user(UserId::new(user_id)).await? else {
        return Ok(None);
    };

    let bound_hash = session.get::<String>(USER_HASH_KEY).await?;
    if bound_hash.as_deref() != Some(user.session_hash.as_str()) {
        tracing::info!(username = %user.username, "Session invalidated by password change");
        session.flush().await?;
        return Ok(None);
    }

    Ok(Some(user.principal()))
}

/// Binds the session to `user`, issuing a fresh session id.
pub async fn start_session(session: &Session, user: &User) -> Result<(), ApiError> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.id.value()).await?;
    session.insert(USER_HASH_KEY, &user.session_hash).await?;
    Ok(())
}

// ============================================================================
// Middleware
// ============================================================================

/// Sends anonymous requests to the login page with `next` set to the original
/// path; otherwise makes the [`Principal`] available as a request extension.
pub async fn login_required(
    State(state): State<Arc<AppState>>,
    OriginalUri(original_uri): OriginalUri,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(principal) = resolve_principal(&state, &session).await? else {
        let next_path = original_uri
            .path_and_query()
            .map_or_else(|| original_uri.path().to_string(), ToString::to_string);
        return Ok(found(&state.urls.login_with_next(&next_path)));
    };

    tracing::Span::current().record("user_id", principal.username.as_str());
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Rejects with 403 unless the `{username}` path segment names the acting
/// user. Must run inside [`login_required`].
pub async fn owner_required(
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !principal.owns(&username) {
        tracing::warn!(
            actor = %principal.username,
            target = %username,
            "Rejected access to another user's account"
        );
        return Err(ApiError::forbidden());
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Renders a page, attaching queued flash messages.
pub async fn render<T: Serialize>(
    session: &Session,
    template: &'static str,
    context: T,
) -> Result<Response, ApiError> {
    let messages = messages::take(session).await?;
    Ok(Json(ApiResponse::success(Page {
        template,
        context,
        messages,
    }))
    .into_response())
}

/// GET /login/
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(current): CurrentUser,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<Response, ApiError> {
    if let Some(principal) = current {
        return Ok(found(&state.urls.detail(&principal.username)));
    }

    render(
        &session,
        templates::LOGIN,
        FormContext {
            fields: &LoginForm::FIELDS,
            next: safe_next(query.next.as_deref()).map(ToString::to_string),
        },
    )
    .await
}

/// POST /login/
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let credentials = form.clean()?;
    let user = state.accounts().authenticate(&credentials).await?;

    start_session(&session, &user).await?;

    let destination = safe_next(form.next.as_deref())
        .map_or_else(|| state.urls.redirect(), ToString::to_string);
    Ok(found(&destination))
}

/// GET|POST /logout/
/// Queued messages go with the flushed session.
pub async fn logout(session: Session) -> Result<Response, ApiError> {
    session.flush().await?;
    Ok(Json(ApiResponse::success(Page {
        template: templates::LOGGED_OUT,
        context: LoggedOutContext {},
        messages: Vec::new(),
    }))
    .into_response())
}

/// GET /~redirect/
pub async fn redirect_to_profile(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    found(&state.urls.detail(&principal.username))
}
