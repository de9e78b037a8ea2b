//! WebSocket endpoints for live conversations and the unread badge.
//!
//! Each socket task owns its state and ends with the connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    Extension,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::chat::{self, ConversationLog, Delivery};
use crate::errors::AppError;
use crate::models::{ChatMessage, CurrentUser};
use crate::realtime::{ChangeEvent, ChangeFilter, ChangeKind};
use crate::AppState;

/// Frames sent by the client on a conversation socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Send { message: String, client_ref: String },
    MarkRead,
}

/// Frames sent by the server.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    History {
        messages: Vec<ChatMessage>,
    },
    Message {
        message: ChatMessage,
    },
    SendConfirmed {
        client_ref: String,
        message: ChatMessage,
    },
    SendFailed {
        client_ref: String,
        error: String,
        /// The body that was not delivered.
        message: String,
    },
    Read {
        message_ids: Vec<String>,
    },
    Unread {
        count: i64,
    },
    Error {
        message: String,
    },
}

/// GET /api/chat/:user_id/ws - Live conversation with another user.
pub async fn conversation_ws(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(other_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if other_id == user.user_id {
        return Err(AppError::Validation("Cannot chat with yourself".to_string()));
    }
    state.repo.require_profile(&other_id).await?;

    Ok(ws.on_upgrade(move |socket| run_conversation(socket, state, user.user_id, other_id)))
}

/// GET /api/notifications/ws - Unread count stream.
pub async fn notifications_ws(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_notifications(socket, state, user.user_id))
}

struct Conversation {
    state: AppState,
    viewer: String,
    other: String,
    log: ConversationLog,
    incoming: ChangeFilter,
    outgoing: ChangeFilter,
    /// Sequence number of the last feed event seen.
    last_seq: u64,
}

async fn run_conversation(mut socket: WebSocket, state: AppState, viewer: String, other: String) {
    // Subscribe before loading history so no message falls in between
    let mut events = state.feed.subscribe();
    let mut conversation = Conversation {
        incoming: ChangeFilter::new().sender(other.as_str()).receiver(viewer.as_str()),
        outgoing: ChangeFilter::new().sender(viewer.as_str()).receiver(other.as_str()),
        log: ConversationLog::new(),
        last_seq: 0,
        state,
        viewer,
        other,
    };

    let history = match conversation
        .state
        .repo
        .conversation(&conversation.viewer, &conversation.other)
        .await
    {
        Ok(history) => history,
        Err(e) => {
            send_frame(&mut socket, &ServerFrame::Error { message: e.message() }).await;
            return;
        }
    };
    for message in history {
        conversation.log.insert(message);
    }
    let messages = conversation.log.messages().cloned().collect();
    if !send_frame(&mut socket, &ServerFrame::History { messages }).await {
        return;
    }
    conversation.mark_read(&mut socket).await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !conversation.handle_event(&mut socket, event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        skipped,
                        after_seq = conversation.last_seq,
                        "Conversation stream lagged, reloading"
                    );
                    if !conversation.resync(&mut socket).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if !conversation.handle_client(&mut socket, text.as_str()).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(
        viewer = %conversation.viewer,
        other = %conversation.other,
        "Conversation socket closed"
    );
}

impl Conversation {
    async fn handle_event(&mut self, socket: &mut WebSocket, event: ChangeEvent) -> bool {
        self.last_seq = event.seq;
        let is_incoming = self.incoming.matches(&event);
        if !is_incoming && !self.outgoing.matches(&event) {
            return true;
        }

        match event.kind {
            ChangeKind::Insert => {
                if !self.log.insert(event.new.clone()) {
                    return true;
                }
                if !send_frame(socket, &ServerFrame::Message { message: event.new }).await {
                    return false;
                }
                // The conversation is open, so incoming messages are read on arrival
                if is_incoming {
                    self.mark_read(socket).await;
                }
                true
            }
            ChangeKind::Update => {
                if !event.became_read() {
                    return true;
                }
                let message_ids = self.log.mark_read([event.new.id.as_str()]);
                if message_ids.is_empty() {
                    return true;
                }
                send_frame(socket, &ServerFrame::Read { message_ids }).await
            }
        }
    }

    async fn handle_client(&mut self, socket: &mut WebSocket, text: &str) -> bool {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                let message = format!("Unrecognised frame: {}", e);
                return send_frame(socket, &ServerFrame::Error { message }).await;
            }
        };

        match frame {
            ClientFrame::Send { message, client_ref } => {
                if !self.log.begin_send(&client_ref, &message) {
                    let message = match self.log.delivery(&client_ref) {
                        Some(Delivery::Confirmed(id)) => {
                            format!("clientRef {} already delivered as {}", client_ref, id)
                        }
                        _ => format!("clientRef {} is still pending", client_ref),
                    };
                    return send_frame(socket, &ServerFrame::Error { message }).await;
                }

                let result = chat::send_message(
                    &self.state.repo,
                    &self.state.feed,
                    &self.viewer,
                    &self.other,
                    &message,
                )
                .await;

                let frame = match result {
                    Ok(stored) => {
                        self.log.confirm(&client_ref, stored.clone());
                        ServerFrame::SendConfirmed {
                            client_ref,
                            message: stored,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(client_ref = %client_ref, "Send failed: {}", e);
                        self.log.fail(&client_ref, &e.message());
                        ServerFrame::SendFailed {
                            message: self
                                .log
                                .outgoing_body(&client_ref)
                                .unwrap_or_default()
                                .to_string(),
                            client_ref,
                            error: e.message(),
                        }
                    }
                };
                send_frame(socket, &frame).await
            }
            ClientFrame::MarkRead => {
                self.mark_read(socket).await;
                true
            }
        }
    }

    /// Mark incoming messages read. Resulting read frames arrive through the feed.
    async fn mark_read(&self, socket: &mut WebSocket) {
        let result = chat::mark_conversation_read(
            &self.state.repo,
            &self.state.feed,
            &self.viewer,
            &self.other,
        )
        .await;
        if let Err(e) = result {
            send_frame(socket, &ServerFrame::Error { message: e.message() }).await;
        }
    }

    /// Reload from the datastore after missing feed events.
    async fn resync(&mut self, socket: &mut WebSocket) -> bool {
        let messages = match self.state.repo.conversation(&self.viewer, &self.other).await {
            Ok(messages) => messages,
            Err(e) => return send_frame(socket, &ServerFrame::Error { message: e.message() }).await,
        };

        let (added, message_ids) = self.log.reconcile(messages);
        for message in added {
            if !send_frame(socket, &ServerFrame::Message { message }).await {
                return false;
            }
        }
        if !message_ids.is_empty()
            && !send_frame(socket, &ServerFrame::Read { message_ids }).await
        {
            return false;
        }

        self.mark_read(socket).await;
        true
    }
}

async fn run_notifications(socket: WebSocket, state: AppState, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let mut counts = match state.unread.watch(&user_id).await {
        Ok(counts) => counts,
        Err(e) => {
            send_frame(&mut sender, &ServerFrame::Error { message: e.message() }).await;
            return;
        }
    };

    let mut push_task = tokio::spawn(async move {
        loop {
            let count = *counts.borrow_and_update();
            if !send_frame(&mut sender, &ServerFrame::Unread { count }).await {
                break;
            }
            if counts.changed().await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut push_task => recv_task.abort(),
        _ = &mut recv_task => push_task.abort(),
    };
}

/// Serialize and send one frame. Returns `false` once the peer is gone.
async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> bool
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to encode frame: {}", e);
            return true;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frames_parse() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"send","message":"hi","clientRef":"r1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Send { ref client_ref, .. } if client_ref == "r1"));

        let frame: ClientFrame = serde_json::from_str(r#"{"type":"markRead"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::MarkRead));

        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn test_server_frames_are_tagged() {
        let json = serde_json::to_value(ServerFrame::Read {
            message_ids: vec!["m1".to_string()],
        })
        .unwrap();
        assert_eq!(json["type"], "read");
        assert_eq!(json["messageIds"][0], "m1");

        let json = serde_json::to_value(ServerFrame::SendFailed {
            client_ref: "r1".to_string(),
            error: "nope".to_string(),
            message: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "sendFailed");
        assert_eq!(json["clientRef"], "r1");
    }
}
