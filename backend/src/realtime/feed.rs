use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::models::ChatMessage;

const DEFAULT_CAPACITY: usize = 1024;

/// Row-level change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
}

/// One committed change to a chat message row.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub seq: u64,
    pub kind: ChangeKind,
    pub new: ChatMessage,
    /// Previous row state, present on updates.
    pub old: Option<ChatMessage>,
}

impl ChangeEvent {
    /// Whether this update flipped the message to read.
    pub fn became_read(&self) -> bool {
        self.kind == ChangeKind::Update
            && self.new.read
            && self.old.as_ref().map_or(true, |old| !old.read)
    }
}

/// Broadcast feed of chat row changes.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    seq: Arc<AtomicU64>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn publish_insert(&self, message: ChatMessage) -> u64 {
        self.publish(ChangeKind::Insert, message, None)
    }

    pub fn publish_update(&self, old: ChatMessage, new: ChatMessage) -> u64 {
        self.publish(ChangeKind::Update, new, Some(old))
    }

    fn publish(&self, kind: ChangeKind, new: ChatMessage, old: Option<ChatMessage>) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let event = ChangeEvent { seq, kind, new, old };

        // No subscribers is not an error
        if self.sender.send(event).is_err() {
            tracing::trace!(seq, "Change published with no subscribers");
        }
        seq
    }
}

/// Predicate over change events by participant.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    sender: Option<String>,
    receiver: Option<String>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(mut self, user_id: impl Into<String>) -> Self {
        self.sender = Some(user_id.into());
        self
    }

    pub fn receiver(mut self, user_id: impl Into<String>) -> Self {
        self.receiver = Some(user_id.into());
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.sender.as_deref().map_or(true, |s| s == event.new.sender_id)
            && self.receiver.as_deref().map_or(true, |r| r == event.new.receiver_id)
    }
}
