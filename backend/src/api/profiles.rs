//! Profile API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CurrentUser, Profile, ProfileQuery, UpdateProfileRequest};
use crate::storage::UploadKind;
use crate::AppState;

/// GET /api/profiles - List other users, optionally filtered by `q`.
pub async fn list_profiles(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ProfileQuery>,
) -> ApiResult<Vec<Profile>> {
    let profiles = state
        .repo
        .list_profiles()
        .await?
        .into_iter()
        .filter(|p| p.id != user.user_id && query.matches(p))
        .collect();

    success(profiles)
}

/// GET /api/profiles/me - The caller's own profile.
pub async fn get_my_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Profile> {
    success(state.repo.require_profile(&user.user_id).await?)
}

/// PUT /api/profiles/me - Edit the caller's own profile.
pub async fn update_my_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Profile> {
    if let Some(username) = &request.username {
        if username.trim().is_empty() {
            return Err(AppError::Validation("Username cannot be empty".to_string()));
        }
    }
    let images = [
        (&request.avatar_url, UploadKind::Avatar),
        (&request.background_url, UploadKind::Background),
    ];
    for (url, kind) in images {
        let Some(url) = url else { continue };
        if !state.storage.is_allowed_image_url(url, &user.user_id, kind) {
            return Err(AppError::Validation(format!("Image not allowed: {}", url)));
        }
    }

    let profile = state.repo.update_profile(&user.user_id, &request).await?;
    tracing::info!(user_id = %user.user_id, "Profile updated");
    success(profile)
}

/// GET /api/profiles/:id - Get a single profile.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Profile> {
    success(state.repo.require_profile(&id).await?)
}
