//! Chat message models.

use serde::{Deserialize, Serialize};

use super::Profile;

/// A direct message. `read` moves from false to true exactly once, by the receiver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub created_at: String,
    pub read: bool,
}

impl ChatMessage {
    /// The participant on the other side from `viewer`.
    pub fn counterpart(&self, viewer: &str) -> &str {
        if self.sender_id == viewer {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// Request body for sending a message.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// One entry of the recent-chats list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentChat {
    pub user: Profile,
    pub last_message: String,
    pub timestamp: String,
    pub unread: bool,
}

/// Unread badge value.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// Result of marking a conversation read.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MarkReadResult {
    pub updated: usize,
}
