use super::collapse_threads;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{ChatMessage, RecentChat};
use crate::realtime::ChangeFeed;

/// How many recent messages are scanned when building thread summaries.
pub const RECENT_SCAN_LIMIT: i64 = 500;

/// Store a message and publish it once committed.
pub async fn send_message(
    repo: &Repository,
    feed: &ChangeFeed,
    sender_id: &str,
    receiver_id: &str,
    body: &str,
) -> Result<ChatMessage, AppError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    if sender_id == receiver_id {
        return Err(AppError::Validation("Cannot message yourself".to_string()));
    }
    repo.require_profile(receiver_id).await?;

    let message = repo.insert_message(sender_id, receiver_id, body).await?;
    feed.publish_insert(message.clone());

    tracing::debug!(message_id = %message.id, "Message sent");
    Ok(message)
}

/// Mark everything `other_id` sent to `reader_id` as read and publish the updates.
pub async fn mark_conversation_read(
    repo: &Repository,
    feed: &ChangeFeed,
    reader_id: &str,
    other_id: &str,
) -> Result<Vec<ChatMessage>, AppError> {
    let updated = repo.mark_conversation_read(reader_id, other_id).await?;

    for message in &updated {
        let mut old = message.clone();
        old.read = false;
        feed.publish_update(old, message.clone());
    }

    Ok(updated)
}

/// The viewer's most recent threads, one per counterpart.
pub async fn recent_chats(
    repo: &Repository,
    viewer: &str,
    limit: usize,
) -> Result<Vec<RecentChat>, AppError> {
    let messages = repo.recent_messages(viewer, RECENT_SCAN_LIMIT).await?;
    let mut chats = Vec::new();

    for message in collapse_threads(viewer, messages, limit) {
        let counterpart = message.counterpart(viewer);
        let Some(user) = repo.get_profile(counterpart).await? else {
            tracing::warn!(user_id = %counterpart, "Skipping thread with unknown user");
            continue;
        };
        chats.push(RecentChat {
            user,
            unread: message.receiver_id == viewer && !message.read,
            last_message: message.message,
            timestamp: message.created_at,
        });
    }

    Ok(chats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_repository;

    #[tokio::test]
    async fn test_send_validates_and_publishes() {
        let (repo, _dir) = temp_repository().await;
        repo.ensure_profile("a", Some("ann")).await.unwrap();
        repo.ensure_profile("b", Some("bob")).await.unwrap();
        let feed = ChangeFeed::new(8);
        let mut events = feed.subscribe();

        let empty = send_message(&repo, &feed, "a", "b", "   ").await;
        assert!(matches!(empty, Err(AppError::Validation(_))));
        let own = send_message(&repo, &feed, "a", "a", "hi").await;
        assert!(matches!(own, Err(AppError::Validation(_))));
        let ghost = send_message(&repo, &feed, "a", "ghost", "hi").await;
        assert!(matches!(ghost, Err(AppError::NotFound(_))));

        let sent = send_message(&repo, &feed, "a", "b", "  hi bob ").await.unwrap();
        assert_eq!(sent.message, "hi bob");

        let event = events.try_recv().unwrap();
        assert_eq!(event.new, sent);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mark_read_publishes_only_changes() {
        let (repo, _dir) = temp_repository().await;
        repo.ensure_profile("a", None).await.unwrap();
        let feed = ChangeFeed::new(8);
        send_message(&repo, &feed, "b", "a", "hello").await.unwrap();
        let mut events = feed.subscribe();

        let updated = mark_conversation_read(&repo, &feed, "a", "b").await.unwrap();
        assert_eq!(updated.len(), 1);
        assert!(events.try_recv().unwrap().became_read());

        assert!(mark_conversation_read(&repo, &feed, "a", "b").await.unwrap().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lagged_conversation_converges_on_datastore() {
        use crate::chat::ConversationLog;
        use tokio::sync::broadcast::error::TryRecvError;

        let (repo, _dir) = temp_repository().await;
        repo.ensure_profile("a", None).await.unwrap();
        repo.ensure_profile("b", None).await.unwrap();
        let feed = ChangeFeed::new(1);

        let mut log = ConversationLog::new();
        let first = send_message(&repo, &feed, "b", "a", "first").await.unwrap();
        log.insert(first);

        let mut events = feed.subscribe();
        send_message(&repo, &feed, "b", "a", "second").await.unwrap();
        send_message(&repo, &feed, "a", "b", "third").await.unwrap();
        mark_conversation_read(&repo, &feed, "a", "b").await.unwrap();
        assert!(matches!(events.try_recv(), Err(TryRecvError::Lagged(_))));

        let (added, read) = log.reconcile(repo.conversation("a", "b").await.unwrap());
        assert_eq!(added.len(), 2);
        assert_eq!(read.len(), 1);

        let stored = repo.conversation("a", "b").await.unwrap();
        let logged: Vec<ChatMessage> = log.messages().cloned().collect();
        assert_eq!(logged, stored);
    }

    #[tokio::test]
    async fn test_recent_chats_flags_unread() {
        let (repo, _dir) = temp_repository().await;
        for (id, name) in [("me", "me"), ("ann", "ann"), ("bob", "bob")] {
            repo.ensure_profile(id, Some(name)).await.unwrap();
        }
        let feed = ChangeFeed::default();
        send_message(&repo, &feed, "me", "ann", "hi ann").await.unwrap();
        send_message(&repo, &feed, "bob", "me", "hi me").await.unwrap();
        send_message(&repo, &feed, "ann", "me", "hello back").await.unwrap();

        let chats = recent_chats(&repo, "me", 5).await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].user.id, "ann");
        assert_eq!(chats[0].last_message, "hello back");
        assert!(chats[0].unread);
        assert_eq!(chats[1].user.id, "bob");
    }
}
