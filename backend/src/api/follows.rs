//! Follow graph and like-list API endpoints.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::{success, ApiResult};
use crate::models::{CurrentUser, FollowStatus, LikedProjects, Profile};
use crate::AppState;

/// GET /api/users/:id/follow - Whether the caller follows `id`.
pub async fn follow_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<FollowStatus> {
    let following = state.repo.is_following(&user.user_id, &id).await?;
    success(FollowStatus {
        following,
        created: None,
    })
}

/// POST /api/users/:id/follow - Follow `id`.
pub async fn follow_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<FollowStatus> {
    let created = state.repo.follow(&user.user_id, &id).await?;
    if created {
        tracing::debug!(follower = %user.user_id, following = %id, "Follow created");
    }
    success(FollowStatus {
        following: true,
        created: Some(created),
    })
}

/// DELETE /api/users/:id/follow - Unfollow `id`.
pub async fn unfollow_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<FollowStatus> {
    state.repo.unfollow(&user.user_id, &id).await?;
    success(FollowStatus {
        following: false,
        created: None,
    })
}

/// GET /api/users/:id/following
pub async fn list_following(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Profile>> {
    state.repo.require_profile(&id).await?;
    success(state.repo.list_following(&id).await?)
}

/// GET /api/users/:id/followers
pub async fn list_followers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Profile>> {
    state.repo.require_profile(&id).await?;
    success(state.repo.list_followers(&id).await?)
}

/// GET /api/users/likes - Projects the caller has liked.
pub async fn list_liked_projects(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<LikedProjects> {
    success(LikedProjects {
        liked_projects: state.repo.liked_project_ids(&user.user_id).await?,
    })
}
