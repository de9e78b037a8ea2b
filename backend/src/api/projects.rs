//! Project API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use super::{success, ApiResult};
use crate::db::NewProject;
use crate::errors::AppError;
use crate::models::{
    CreateProjectRequest, CurrentUser, LikeToggle, Project, ProjectDetail, ProjectQuery,
    UpdateProjectRequest,
};
use crate::storage::UploadKind;
use crate::AppState;

/// GET /api/projects - List projects, filtered and sorted by the query.
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Vec<Project>> {
    let projects = state.repo.list_projects().await?;
    success(query.apply(projects))
}

/// GET /api/projects/:id - Project detail with its creator.
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProjectDetail> {
    let project = state.repo.require_project(&id).await?;
    let creator = state.repo.get_profile(&project.user_id).await?;
    success(ProjectDetail { project, creator })
}

/// POST /api/projects - Create a project owned by the caller.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let image_url = request
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    match image_url {
        None if state.config.require_project_image => {
            return Err(AppError::Validation("Image is required".to_string()));
        }
        Some(url) => check_image_url(&state, url, &user)?,
        None => {}
    }

    let project = state
        .repo
        .create_project(&NewProject {
            user_id: &user.user_id,
            title,
            description: request.description.trim(),
            technologies: request.technologies.as_slice(),
            image_url,
        })
        .await?;

    // Index the new project
    if let Err(e) = state.search.index_project(&project).await {
        tracing::warn!("Failed to index project: {}", e);
    }

    tracing::info!(project_id = %project.id, user_id = %user.user_id, "Project created");
    success(project)
}

/// PUT /api/projects/:id - Edit a project. Owner only.
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> ApiResult<Project> {
    let existing = state.repo.require_project(&id).await?;
    ensure_owner(&existing, &user)?;

    if let Some(title) = &request.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title cannot be empty".to_string()));
        }
    }
    if let Some(url) = &request.image_url {
        check_image_url(&state, url, &user)?;
    }

    let project = state.repo.update_project(&id, &request).await?;

    // Re-index the updated project
    if let Err(e) = state.search.index_project(&project).await {
        tracing::warn!("Failed to re-index project: {}", e);
    }

    if let Some(old_image) = existing.image_url {
        if project.image_url.as_deref() != Some(old_image.as_str()) {
            remove_image(&state, &old_image, &existing.user_id).await;
        }
    }

    success(project)
}

/// DELETE /api/projects/:id - Delete a project. Owner only.
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let existing = state.repo.require_project(&id).await?;
    ensure_owner(&existing, &user)?;

    state.repo.delete_project(&id).await?;

    // Remove from search index
    if let Err(e) = state.search.remove_project(&id).await {
        tracing::warn!("Failed to remove project from index: {}", e);
    }
    if let Some(image_url) = existing.image_url {
        remove_image(&state, &image_url, &existing.user_id).await;
    }

    tracing::info!(project_id = %id, "Project deleted");
    success(())
}

/// POST /api/projects/:id/like - Toggle the caller's like.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<LikeToggle> {
    success(state.repo.toggle_like(&user.user_id, &id).await?)
}

fn ensure_owner(project: &Project, user: &CurrentUser) -> Result<(), AppError> {
    if project.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "Only the project owner can change it".to_string(),
        ));
    }
    Ok(())
}

fn check_image_url(state: &AppState, url: &str, user: &CurrentUser) -> Result<(), AppError> {
    if state
        .storage
        .is_allowed_image_url(url, &user.user_id, UploadKind::Project)
    {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Image not allowed: {}", url)))
    }
}

/// Best-effort cleanup of a project image `owner` uploaded.
async fn remove_image(state: &AppState, url: &str, owner: &str) {
    match state.storage.delete_owned(url, owner, UploadKind::Project).await {
        Ok(true) => tracing::debug!(url = %url, "Project image deleted"),
        Ok(false) => {}
        Err(e) => tracing::warn!(url = %url, "Failed to delete project image: {}", e),
    }
}
