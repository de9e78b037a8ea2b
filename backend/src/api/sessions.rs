//! Session API endpoints.

use axum::{extract::State, Extension, Json};
use chrono::Duration;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateSessionRequest, CurrentUser, SessionGrant};
use crate::AppState;

/// POST /api/auth/sessions - Issue a session for a user vouched for by the identity provider.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<SessionGrant> {
    if !request.email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }

    let user_id = request
        .user_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let username = request.default_username();
    let profile = state.repo.ensure_profile(&user_id, username.as_deref()).await?;
    let ttl = Duration::try_hours(state.config.session_ttl_hours)
        .ok_or_else(|| AppError::Internal("Session lifetime out of range".to_string()))?;
    let session = state.repo.create_session(&user_id, ttl).await?;

    tracing::info!(user_id = %user_id, "Session issued");

    success(SessionGrant {
        token: session.token,
        user_id,
        expires_at: session.expires_at,
        profile,
    })
}

/// DELETE /api/auth/sessions/current - Sign out.
pub async fn delete_current_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    state.repo.delete_session(&user.token).await?;
    success(())
}
