//! Direct messaging: conversation state, recent threads and the write path.

mod conversation;
mod service;
mod threads;

pub use conversation::{ConversationLog, Delivery};
pub use service::{mark_conversation_read, recent_chats, send_message};
pub use threads::collapse_threads;
