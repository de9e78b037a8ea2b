//! Chat message operations.

use sqlx::Row;

use super::{now, Repository};
use crate::errors::AppError;
use crate::models::ChatMessage;

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, message, created_at, read";

impl Repository {
    // ==================== CHAT OPERATIONS ====================

    /// Store a new unread message. Ids are UUIDv7 so they sort by creation.
    pub async fn insert_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
    ) -> Result<ChatMessage, AppError> {
        let message = ChatMessage {
            id: uuid::Uuid::now_v7().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            message: body.to_string(),
            created_at: now(),
            read: false,
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, sender_id, receiver_id, message, created_at, read) VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.message)
        .bind(&message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    /// All messages between two users, oldest first.
    pub async fn conversation(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?) ORDER BY created_at ASC, id ASC"
        ))
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    /// Mark everything `sender_id` sent to `reader_id` as read.
    ///
    /// Only rows that actually flipped are returned, so a repeat call yields
    /// an empty list.
    pub async fn mark_conversation_read(
        &self,
        reader_id: &str,
        sender_id: &str,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = sqlx::query(&format!(
            "UPDATE chat_messages SET read = 1 WHERE receiver_id = ? AND sender_id = ? AND read = 0 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(reader_id)
        .bind(sender_id)
        .fetch_all(&self.pool)
        .await?;

        let mut updated: Vec<ChatMessage> = rows.iter().map(message_from_row).collect();
        updated.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        Ok(updated)
    }

    /// Number of unread messages addressed to `user_id`.
    pub async fn unread_count(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM chat_messages WHERE receiver_id = ? AND read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(count)
    }

    /// Messages sent or received by `user_id`, newest first.
    pub async fn recent_messages(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE sender_id = ? OR receiver_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> ChatMessage {
    let read: i64 = row.get("read");
    ChatMessage {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        message: row.get("message"),
        created_at: row.get("created_at"),
        read: read != 0,
    }
}
