//! In-process change feed and unread-count fan-out.
//!
//! Writes publish chat row changes to the [`ChangeFeed`] after they commit.
//! The [`UnreadHub`] holds the one subscription that keeps per-user unread
//! counts, and every badge or socket observes those counts through it.

mod feed;
mod unread;

pub use feed::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind};
pub use unread::UnreadHub;
