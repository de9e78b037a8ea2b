use std::collections::HashSet;

use crate::models::ChatMessage;

/// Keep the newest message per counterpart, up to `limit` threads.
///
/// `messages` must be ordered newest first.
pub fn collapse_threads(
    viewer: &str,
    messages: Vec<ChatMessage>,
    limit: usize,
) -> Vec<ChatMessage> {
    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter(|m| seen.insert(m.counterpart(viewer).to_string()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, from: &str, to: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            message: id.to_string(),
            created_at: String::new(),
            read: false,
        }
    }

    #[test]
    fn test_one_entry_per_counterpart() {
        let newest_first = vec![
            message("4", "me", "bob"),
            message("3", "ann", "me"),
            message("2", "bob", "me"),
            message("1", "me", "ann"),
        ];

        let threads = collapse_threads("me", newest_first, 10);
        let ids: Vec<_> = threads.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3"]);
    }

    #[test]
    fn test_limit_applies_to_threads() {
        let newest_first = vec![
            message("3", "a", "me"),
            message("2", "a", "me"),
            message("1", "b", "me"),
        ];

        let threads = collapse_threads("me", newest_first, 1);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].id, "3");
    }
}
