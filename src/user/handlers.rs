use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::UpdateProfileRequest;
use crate::{
    auth::{
        cookie,
        dto::is_valid_email,
        extractors::AuthUser,
        jwt::Identity,
        repo_types::{ProfileUpdate, UserRecord, UserSettings},
    },
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/user/profile", get(get_profile).put(update_profile))
        .route("/api/user/settings", get(get_settings).put(update_settings))
}

async fn load_user(state: &AppState, who: &Identity) -> Result<UserRecord, AppError> {
    state
        .users
        .find_by_id(who.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[instrument(skip(state, who), fields(user_id = %who.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
) -> Result<Json<UserRecord>, AppError> {
    Ok(Json(load_user(&state, &who).await?))
}

/// Updates name/email and re-issues the session cookie so the token carries
/// the new values.
#[instrument(skip(state, who, payload), fields(user_id = %who.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<UserRecord>), AppError> {
    let Json(body) = payload.map_err(|_| AppError::Validation("Invalid request body".into()))?;

    let name = body.name.map(|n| n.trim().to_string());
    let email = body.email.map(|e| e.trim().to_string());

    if matches!(&name, Some(n) if n.is_empty()) {
        return Err(AppError::Validation("Name cannot be empty".into()));
    }
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email".into()));
        }
        if let Some(owner) = state.users.find_by_email(email).await? {
            if owner.id != who.id {
                warn!(%email, "email already registered");
                return Err(AppError::Conflict("Email already in use".into()));
            }
        }
    }

    let record = state
        .users
        .update_profile(who.id, ProfileUpdate { name, email })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let mut headers = HeaderMap::new();
    cookie::attach(
        &mut headers,
        &state.tokens,
        &Identity {
            id: record.id,
            name: record.name.clone(),
            email: record.email.clone(),
        },
        state.config.auth.secure_cookies,
    )?;

    info!("profile updated");
    Ok((headers, Json(record)))
}

#[instrument(skip(state, who), fields(user_id = %who.id))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
) -> Result<Json<UserSettings>, AppError> {
    Ok(Json(load_user(&state, &who).await?.settings))
}

#[instrument(skip(state, who, payload), fields(user_id = %who.id))]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    payload: Result<Json<UserSettings>, JsonRejection>,
) -> Result<Json<UserSettings>, AppError> {
    let Json(settings) = payload.map_err(|_| AppError::Validation("Invalid settings".into()))?;
    let record = state
        .users
        .update_settings(who.id, settings)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!("settings updated");
    Ok(Json(record.settings))
}
