use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::ChatMessage;

/// Delivery state of a locally originated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    /// Stored; holds the message id.
    Confirmed(String),
    Failed(String),
}

#[derive(Debug, Clone)]
struct OutgoingEntry {
    body: String,
    delivery: Delivery,
}

/// Ordered, append-only view of one conversation.
///
/// Messages are keyed by `(created_at, id)` and each id appears once, so the
/// same row arriving from history, the write response and the feed is kept
/// a single time. Outgoing sends are tracked by the client's reference until
/// they resolve.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: BTreeMap<(String, String), ChatMessage>,
    ids: HashSet<String>,
    outgoing: HashMap<String, OutgoingEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stored message. Returns `false` if its id is already present.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages
            .insert((message.created_at.clone(), message.id.clone()), message);
        true
    }

    /// Flag the given messages as read. Returns the ids that changed.
    pub fn mark_read<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let wanted: HashSet<&str> = ids.into_iter().collect();
        self.messages
            .values_mut()
            .filter(|m| !m.read && wanted.contains(m.id.as_str()))
            .map(|m| {
                m.read = true;
                m.id.clone()
            })
            .collect()
    }

    /// Merge a fresh datastore snapshot after missed feed events.
    ///
    /// Returns the rows that were not in the log and the ids that became read.
    pub fn reconcile(&mut self, snapshot: Vec<ChatMessage>) -> (Vec<ChatMessage>, Vec<String>) {
        let read_ids: Vec<String> = snapshot
            .iter()
            .filter(|m| m.read)
            .map(|m| m.id.clone())
            .collect();

        let added = snapshot
            .into_iter()
            .filter(|m| self.insert(m.clone()))
            .collect();
        let newly_read = self.mark_read(read_ids.iter().map(String::as_str));

        (added, newly_read)
    }

    /// Register an outgoing send. Returns `false` if the reference is pending
    /// or confirmed; a failed send may be retried under the same reference.
    pub fn begin_send(&mut self, client_ref: &str, body: &str) -> bool {
        if matches!(
            self.delivery(client_ref),
            Some(Delivery::Pending | Delivery::Confirmed(_))
        ) {
            return false;
        }
        self.outgoing.insert(
            client_ref.to_string(),
            OutgoingEntry {
                body: body.to_string(),
                delivery: Delivery::Pending,
            },
        );
        true
    }

    /// Resolve a pending send with its stored row.
    ///
    /// Returns `true` only for the call that moved it out of `Pending`.
    pub fn confirm(&mut self, client_ref: &str, message: ChatMessage) -> bool {
        let Some(entry) = self.outgoing.get_mut(client_ref) else {
            return false;
        };
        if entry.delivery != Delivery::Pending {
            return false;
        }
        entry.delivery = Delivery::Confirmed(message.id.clone());
        self.insert(message);
        true
    }

    /// Mark a pending send as failed. It never enters the message list.
    pub fn fail(&mut self, client_ref: &str, error: &str) -> bool {
        match self.outgoing.get_mut(client_ref) {
            Some(entry) if entry.delivery == Delivery::Pending => {
                entry.delivery = Delivery::Failed(error.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn delivery(&self, client_ref: &str) -> Option<&Delivery> {
        self.outgoing.get(client_ref).map(|entry| &entry.delivery)
    }

    /// Body of an outgoing send, kept so a failed one can be retried.
    pub fn outgoing_body(&self, client_ref: &str) -> Option<&str> {
        self.outgoing.get(client_ref).map(|entry| entry.body.as_str())
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.values()
    }
}
