//! Comment API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{Comment, CreateCommentRequest, CurrentUser};
use crate::AppState;

/// GET /api/projects/:id/comments - Comments, newest first.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Comment>> {
    state.repo.require_project(&id).await?;
    success(state.repo.list_comments(&id).await?)
}

/// POST /api/projects/:id/comments - Add a comment as the caller.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<Comment> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".to_string()));
    }

    success(state.repo.create_comment(&id, &user.user_id, content).await?)
}
