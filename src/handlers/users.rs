use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use garde::Validate;

use crate::{
    crypto::password::hash_password_blocking,
    error::{AppError, Result},
    json::{PathParam, SonicJson},
    middleware_layer::auth::Viewer,
    models::{
        session::Principal,
        user::{AccountCreationRequest, NewUser, User, UserUpdate},
    },
    services::{
        authorization::{authorize_user_update, is_admin},
        notifier::Email,
    },
    state::AppState,
};

/// Handles registration.
pub async fn register(
    State(state): State<AppState>,
    SonicJson(request): SonicJson<AccountCreationRequest>,
) -> Result<(StatusCode, SonicJson<User>)> {
    let details = request.account_details;
    details.validate()?;
    tracing::info!("📝 Registration for {}", details.email);

    let password_hash = hash_password_blocking(details.password).await?;
    let user = state
        .users
        .create(NewUser {
            first_name: details.first_name,
            last_name: details.last_name,
            email: details.email,
            password_hash,
            role: details.access_request,
            email_notification: details.email_notification,
        })
        .await?;
    tracing::info!("✅ User registered: {} ({})", user.id, user.role);

    let notice = Email::new_member(
        &state.config.notify_from,
        &state.config.admin_contact,
        &user,
    );
    if let Err(e) = state.notifier.send(notice).await {
        tracing::error!("❌ New member notification failed: {}", e);
    }

    Ok((StatusCode::CREATED, SonicJson(user)))
}

/// Returns the signed-in user, or 204 for anonymous callers.
pub async fn current_user(State(state): State<AppState>, viewer: Viewer) -> Result<Response> {
    let Some(principal) = viewer.principal() else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    match state.users.find_by_id(principal.subject_id).await? {
        Some(user) => Ok(SonicJson(user).into_response()),
        // The account was deleted after the credential was issued.
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Returns one user. Callers may read themselves; admins may read anyone.
pub async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParam(id): PathParam<i32>,
) -> Result<SonicJson<User>> {
    if principal.subject_id != id && !is_admin(principal.role) {
        return Err(AppError::Forbidden(format!(
            "user {} may not read user {}",
            principal.subject_id, id
        )));
    }

    let user = state.users.find_by_id(id).await?.ok_or(AppError::NotFound("user"))?;
    Ok(SonicJson(user))
}

/// Handles profile updates, including role changes.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParam(id): PathParam<i32>,
    SonicJson(update): SonicJson<UserUpdate>,
) -> Result<SonicJson<User>> {
    update.validate()?;
    authorize_user_update(&principal, id, update.role)
        .map_err(|denied| AppError::Forbidden(denied.to_string()))?;

    let user = state
        .users
        .update(id, &update)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    tracing::info!("✏️ User {} updated by {}", id, principal.subject_id);
    Ok(SonicJson(user))
}

/// Removes an account. Admin only.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParam(id): PathParam<i32>,
) -> Result<StatusCode> {
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("user"));
    }
    tracing::info!("🗑️ User {} deleted by {}", id, principal.subject_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Lists every account. Admin only.
pub async fn list_users(State(state): State<AppState>) -> Result<SonicJson<Vec<User>>> {
    Ok(SonicJson(state.users.list().await?))
}
