//! Image upload and stored-object endpoints.

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use bytes::Bytes;
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CurrentUser, Profile};
use crate::storage::{StoredObject, UploadKind};
use crate::AppState;

/// Upload result; profile image uploads also return the updated profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(flatten)]
    pub object: StoredObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

/// POST /api/upload - Store an image (multipart `file`, optional `kind`).
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let mut kind = UploadKind::Project;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("kind") => {
                kind = field.text().await?.trim().parse().map_err(AppError::Validation)?;
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                file = Some((file_name, field.bytes().await?));
            }
            _ => {}
        }
    }

    let Some((file_name, data)) = file else {
        return Err(AppError::Validation("No file provided".to_string()));
    };

    let object = state
        .storage
        .upload_image(&user.user_id, kind, &file_name, data)
        .await?;

    let profile = match kind.profile_image() {
        Some(image) => Some(
            state
                .repo
                .set_profile_image(&user.user_id, image, &object.image_url)
                .await?,
        ),
        None => None,
    };

    tracing::info!(user_id = %user.user_id, path = %object.path, "Image uploaded");
    success(UploadResponse { object, profile })
}

/// GET /storage/:bucket/*path - Serve a stored object.
pub async fn serve_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (data, content_type) = state.storage.fetch(&bucket, &path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        data,
    )
        .into_response())
}
