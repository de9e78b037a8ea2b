//! REST and WebSocket API module.
//!
//! Contains all routes and handlers for the client contract.

mod chat;
mod comments;
mod follows;
mod profiles;
mod projects;
mod realtime;
mod search;
mod sessions;
mod upload;

pub use chat::*;
pub use comments::*;
pub use follows::*;
pub use profiles::*;
pub use projects::*;
pub use realtime::*;
pub use search::*;
pub use sessions::*;
pub use upload::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}
