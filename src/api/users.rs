use axum::{
    Extension, Form,
    extract::{Path, State},
    response::Response,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{CurrentUser, render, start_session};
use super::types::{
    DetailContext, FormContext, OwnerLinks, PasswordChangeContext, UpdateContext, UserDto,
};
use super::urls::found;
use super::{ApiError, AppState, messages};
use crate::constants::{messages as notices, templates};
use crate::domain::Principal;
use crate::forms::{CreateUserForm, Credentials, PasswordChangeForm, UpdateUserForm};

/// GET /register/
pub async fn register_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(current): CurrentUser,
    session: Session,
) -> Result<Response, ApiError> {
    if let Some(principal) = current {
        return Ok(found(&state.urls.detail(&principal.username)));
    }

    render(
        &session,
        templates::REGISTER,
        FormContext {
            fields: &CreateUserForm::FIELDS,
            next: None,
        },
    )
    .await
}

/// POST /register/
/// Creates the account and logs the new user in with the password just given.
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<CreateUserForm>,
) -> Result<Response, ApiError> {
    let created = state.accounts().register(&form).await?;

    let credentials = Credentials {
        username: created.username.clone(),
        password: form.password2.clone(),
    };
    let user = state.accounts().authenticate(&credentials).await?;
    start_session(&session, &user).await?;

    Ok(found(&state.urls.detail(&user.username)))
}

/// GET /{username}/
/// Unknown and inactive accounts are both 404, for the owner too.
pub async fn detail(
    State(state): State<Arc<AppState>>,
    CurrentUser(current): CurrentUser,
    session: Session,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let user = state.accounts().get_active_user(&username).await?;

    let is_owner = current
        .as_ref()
        .is_some_and(|principal| principal.user_id == user.id);
    let url = state.urls.detail(&user.username);

    render(
        &session,
        templates::DETAIL,
        DetailContext {
            object: UserDto::new(&user, url, is_owner),
            is_owner,
            links: is_owner.then(|| OwnerLinks::new(&state.urls, &user.username)),
        },
    )
    .await
}

/// GET /{username}/update-account/
pub async fn update_page(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let user = state.accounts().get_owned_user(&principal, &username).await?;
    let url = state.urls.detail(&user.username);

    render(
        &session,
        templates::UPDATE,
        UpdateContext {
            form: UpdateUserForm::initial(&user),
            object: UserDto::new(&user, url, true),
            fields: &UpdateUserForm::FIELDS,
        },
    )
    .await
}

/// POST /{username}/update-account/
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
    Form(form): Form<UpdateUserForm>,
) -> Result<Response, ApiError> {
    let user = state
        .accounts()
        .update_profile(&principal, &username, &form)
        .await?;

    Ok(found(&state.urls.detail(&user.username)))
}

/// GET /{username}/delete-account/
/// Deactivates the account; nothing is erased.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    state.accounts().deactivate(&principal, &username).await?;

    messages::success(&session, notices::USER_DELETED).await?;

    Ok(found(&state.index_url))
}

/// GET /{username}/change-password/
pub async fn change_password_page(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let user = state.accounts().get_owned_user(&principal, &username).await?;

    render(
        &session,
        templates::PASSWORD_CHANGE,
        PasswordChangeContext {
            username: user.username,
            fields: &PasswordChangeForm::FIELDS,
        },
    )
    .await
}

/// POST /{username}/change-password/
/// This session is re-bound to the new password; every other session of the
/// account is logged out.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(username): Path<String>,
    Form(form): Form<PasswordChangeForm>,
) -> Result<Response, ApiError> {
    let user = state
        .accounts()
        .change_password(&principal, &username, &form)
        .await?;

    start_session(&session, &user).await?;
    messages::success(&session, notices::PASSWORD_CHANGED).await?;

    Ok(found(&state.urls.detail(&user.username)))
}
