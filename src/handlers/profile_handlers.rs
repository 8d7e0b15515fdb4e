//! HTTP handlers for owner profiles.
//!
//! Profile writes are limited to the acting user's own profile.

use crate::{errors::AppError, handlers::actor::Actor, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: String,
    pub full_name: String,
}

fn ensure_self(actor: &Actor, user_id: &str) -> Result<(), AppError> {
    if actor.0 != user_id {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "You can only change your own profile.",
        ));
    }
    Ok(())
}

/// `POST /profiles` - profile for the acting user.
pub async fn create_profile(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .profiles
        .create_profile(&actor.0, &request.full_name, &request.email)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.profiles.get_profile(&user_id).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self(&actor, &user_id)?;
    let profile = state
        .profiles
        .update_profile(&user_id, &request.username, &request.full_name)
        .await?;
    Ok(Json(profile))
}

/// `DELETE /profiles/{user_id}` - soft delete; the row is kept.
pub async fn delete_profile(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self(&actor, &user_id)?;
    state.profiles.soft_delete_profile(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /profiles/{user_id}/listings` - the owner's listings, newest first.
pub async fn list_profile_listings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let listings = state.repository.list_by_owner(&user_id).await?;
    Ok(Json(listings))
}
