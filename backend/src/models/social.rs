//! Follow and comment models.

use serde::{Deserialize, Serialize};

/// Result of a follow mutation or status query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatus {
    pub following: bool,
    /// Whether this call created the edge; absent on status queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

/// A comment on a project. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub username: Option<String>,
    pub content: String,
    pub created_at: String,
}

/// Request body for adding a comment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}
