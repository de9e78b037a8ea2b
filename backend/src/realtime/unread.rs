use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use super::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::db::Repository;
use crate::errors::AppError;

/// Process-wide unread counts, one watch channel per observed user.
///
/// Counts always come from the datastore. Feed events only say whose count
/// to recompute, so observers of the same user cannot drift apart.
pub struct UnreadHub {
    repo: Arc<Repository>,
    channels: Mutex<HashMap<String, watch::Sender<i64>>>,
}

impl UnreadHub {
    pub fn new(repo: Arc<Repository>) -> Arc<Self> {
        Arc::new(Self {
            repo,
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Subscribe to the feed and keep counts current until it closes.
    pub fn start(self: &Arc<Self>, feed: &ChangeFeed) -> JoinHandle<()> {
        let mut events = feed.subscribe();
        let hub = Arc::clone(self);

        tokio::spawn(async move {
            let mut last_seq = 0;
            loop {
                match events.recv().await {
                    Ok(event) => {
                        last_seq = event.seq;
                        hub.apply(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            skipped,
                            after_seq = last_seq,
                            "Unread hub lagged, resynchronising"
                        );
                        hub.resync_all().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("Unread hub stopped");
        })
    }

    /// Observe `user_id`'s unread count. The receiver starts at the current value.
    pub async fn watch(&self, user_id: &str) -> Result<watch::Receiver<i64>, AppError> {
        let mut channels = self.channels.lock().await;
        if let Some(sender) = channels.get(user_id) {
            return Ok(sender.subscribe());
        }

        // Seeded under the lock so no refresh for this user can interleave
        let count = self.repo.unread_count(user_id).await?;
        let (sender, receiver) = watch::channel(count);
        channels.insert(user_id.to_string(), sender);
        Ok(receiver)
    }

    /// Current unread count, read from the datastore and pushed to observers.
    pub async fn current(&self, user_id: &str) -> Result<i64, AppError> {
        let channels = self.channels.lock().await;
        let count = self.repo.unread_count(user_id).await?;
        if let Some(sender) = channels.get(user_id) {
            publish(sender, count);
        }
        Ok(count)
    }

    async fn apply(&self, event: &ChangeEvent) {
        if event.kind == ChangeKind::Update && !event.became_read() {
            return;
        }
        // Only the receiver's count depends on a message row
        self.refresh(&event.new.receiver_id).await;
    }

    async fn refresh(&self, user_id: &str) {
        let mut channels = self.channels.lock().await;
        let Some(sender) = channels.get(user_id) else {
            return;
        };
        if sender.receiver_count() == 0 {
            channels.remove(user_id);
            return;
        }

        match self.repo.unread_count(user_id).await {
            Ok(count) => publish(sender, count),
            Err(e) => tracing::error!(user_id = %user_id, "Failed to refresh unread count: {}", e),
        }
    }

    async fn resync_all(&self) {
        let mut channels = self.channels.lock().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);

        for (user_id, sender) in channels.iter() {
            match self.repo.unread_count(user_id).await {
                Ok(count) => publish(sender, count),
                Err(e) => {
                    tracing::error!(user_id = %user_id, "Failed to resync unread count: {}", e)
                }
            }
        }
    }
}

fn publish(sender: &watch::Sender<i64>, count: i64) {
    sender.send_if_modified(|current| {
        if *current == count {
            false
        } else {
            *current = count;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_repository;
    use std::time::Duration;

    async fn next_value(rx: &mut watch::Receiver<i64>) -> i64 {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("timed out waiting for unread count")
            .expect("hub dropped");
        *rx.borrow_and_update()
    }

    #[tokio::test]
    async fn test_observers_converge_on_same_count() {
        let (repo, _dir) = temp_repository().await;
        let repo = Arc::new(repo);
        let feed = ChangeFeed::new(16);
        let hub = UnreadHub::new(Arc::clone(&repo));
        hub.start(&feed);

        let mut badge = hub.watch("a").await.unwrap();
        let mut indicator = hub.watch("a").await.unwrap();
        assert_eq!(*badge.borrow(), 0);

        let message = repo.insert_message("b", "a", "hello").await.unwrap();
        feed.publish_insert(message);
        assert_eq!(next_value(&mut badge).await, 1);
        assert_eq!(next_value(&mut indicator).await, 1);

        for read in repo.mark_conversation_read("a", "b").await.unwrap() {
            let mut old = read.clone();
            old.read = false;
            feed.publish_update(old, read);
        }
        assert_eq!(next_value(&mut badge).await, 0);
        assert_eq!(next_value(&mut indicator).await, 0);
        assert_eq!(hub.current("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lagged_hub_resyncs_observers() {
        let (repo, _dir) = temp_repository().await;
        let repo = Arc::new(repo);
        let feed = ChangeFeed::new(1);
        let hub = UnreadHub::new(Arc::clone(&repo));
        hub.start(&feed);

        let mut badge = hub.watch("a").await.unwrap();
        let one = repo.insert_message("b", "a", "one").await.unwrap();
        let two = repo.insert_message("b", "a", "two").await.unwrap();
        let other = repo.insert_message("b", "c", "elsewhere").await.unwrap();

        // The hub task has not run yet, so only the last event survives and
        // it does not concern "a"; the count must come from the resync
        feed.publish_insert(one);
        feed.publish_insert(two);
        feed.publish_insert(other);

        assert_eq!(next_value(&mut badge).await, 2);
        assert_eq!(hub.current("a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_current_without_observers() {
        let (repo, _dir) = temp_repository().await;
        let repo = Arc::new(repo);
        repo.insert_message("b", "a", "one").await.unwrap();
        repo.insert_message("c", "a", "two").await.unwrap();

        let hub = UnreadHub::new(Arc::clone(&repo));
        assert_eq!(hub.current("a").await.unwrap(), 2);
        assert_eq!(hub.current("b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_observers_are_pruned() {
        let (repo, _dir) = temp_repository().await;
        let repo = Arc::new(repo);
        let hub = UnreadHub::new(Arc::clone(&repo));

        drop(hub.watch("a").await.unwrap());
        hub.refresh("a").await;

        assert!(hub.channels.lock().await.is_empty());
    }
}
