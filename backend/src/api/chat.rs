//! Chat REST endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::chat;
use crate::models::{
    ChatMessage, CurrentUser, MarkReadResult, RecentChat, SendMessageRequest, UnreadCount,
};
use crate::AppState;

const DEFAULT_RECENT_LIMIT: usize = 5;
const MAX_RECENT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/chat/recent - One entry per counterpart, newest first.
pub async fn recent_chats(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Vec<RecentChat>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
    success(chat::recent_chats(&state.repo, &user.user_id, limit).await?)
}

/// GET /api/chat/:user_id/messages - The conversation, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(other_id): Path<String>,
) -> ApiResult<Vec<ChatMessage>> {
    state.repo.require_profile(&other_id).await?;
    success(state.repo.conversation(&user.user_id, &other_id).await?)
}

/// POST /api/chat/:user_id/messages - Send a message.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(other_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<ChatMessage> {
    let message = chat::send_message(
        &state.repo,
        &state.feed,
        &user.user_id,
        &other_id,
        &request.message,
    )
    .await?;
    success(message)
}

/// POST /api/chat/:user_id/read - Mark the conversation read.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(other_id): Path<String>,
) -> ApiResult<MarkReadResult> {
    let updated =
        chat::mark_conversation_read(&state.repo, &state.feed, &user.user_id, &other_id).await?;
    success(MarkReadResult {
        updated: updated.len(),
    })
}

/// GET /api/notifications/unread - The caller's unread message count.
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<UnreadCount> {
    let count = state.unread.current(&user.user_id).await?;
    success(UnreadCount { count })
}
