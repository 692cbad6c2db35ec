//! WebSocket endpoint for realtime notifications.
//!
//! Clients connect to `/ws/notifications?token=<bearer token>`. Frame
//! types are shared with the client through `tutorly_common::realtime`.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tutorly_common::{ApiError, ClientMessage};
use tutorly_db::Notification;

use crate::state::SharedState;

/// Frames this server pushes, carrying stored notification rows.
pub type ServerMessage = tutorly_common::ServerMessage<Notification>;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws/notifications - Upgrade to the notification socket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(params): Query<WsParams>,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
    let user = state
        .tokens
        .resolve(&token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".into()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user.id)))
}

async fn handle_socket(socket: WebSocket, state: SharedState, user_id: Uuid) {
    info!(%user_id, "notification socket opened");

    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.notifier.subscribe());
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(16);
    let ping_every = Duration::from_secs(state.config.notifications.ping_interval_secs);

    let initial = match state.notifications.unread_count(user_id).await {
        Ok(count) => count,
        Err(e) => {
            warn!(%user_id, error = %e, "could not read unread count");
            0
        }
    };

    // Forward hub events for this user, replies, and keep-alive pings.
    let notifications = state.notifications.clone();
    let mut send_task = tokio::spawn(async move {
        if send_json(&mut sender, &ServerMessage::UnreadCount { count: initial }).await.is_err() {
            return;
        }
        let mut ping = tokio::time::interval(ping_every);
        ping.tick().await;

        loop {
            let outgoing = tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) if event.user_id == user_id => event.message,
                    Some(Ok(_)) => continue,
                    Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                        debug!(%user_id, missed, "notification socket lagged");
                        match notifications.unread_count(user_id).await {
                            Ok(count) => ServerMessage::UnreadCount { count },
                            Err(_) => continue,
                        }
                    }
                    None => break,
                },
                Some(reply) = reply_rx.recv() => reply,
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                    continue;
                }
            };
            if send_json(&mut sender, &outgoing).await.is_err() {
                break;
            }
        }
    });

    // Handle ping and mark_read requests from the client.
    let notifications = state.notifications.clone();
    let notifier = state.notifier.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::Ping) => ServerMessage::Pong { timestamp: Utc::now() },
                Ok(ClientMessage::MarkRead { notification_id }) => {
                    let success = match notifications.mark_read(user_id, notification_id).await {
                        Ok(updated) => updated,
                        Err(e) => {
                            warn!(%user_id, %notification_id, error = %e, "mark_read failed");
                            false
                        }
                    };
                    if success {
                        // Other open sockets of the same user follow along.
                        if let Err(e) = notifier.publish_unread_count(user_id).await {
                            warn!(%user_id, error = %e, "could not publish unread count");
                        }
                    }
                    ServerMessage::MarkReadResponse { notification_id, success }
                }
                Err(e) => ServerMessage::Error { message: format!("Invalid message: {e}") },
            };

            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!(%user_id, "notification socket closed");
}

async fn send_json<S>(sender: &mut S, message: &ServerMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = serde_json::to_string(message).map_err(|_| ())?;
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
