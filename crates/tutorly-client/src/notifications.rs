//! Reconnecting client for the `/ws/notifications` stream.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::models::{ClientMessage, ServerMessage};

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// `base_delay · 2^(attempt−1)`, capped at `max_delay`. Attempts count from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connected,
    Message(ServerMessage),
    Disconnected,
    Reconnecting { attempt: u32, delay: Duration },
    /// Every reconnect attempt failed; the socket task has stopped.
    GaveUp,
}

/// Handle to a background connection. Dropping it closes the socket.
pub struct NotificationSocket {
    commands: mpsc::Sender<ClientMessage>,
    task: JoinHandle<()>,
}

enum Exit {
    Disconnected,
    Shutdown,
}

impl NotificationSocket {
    /// Connect to `url` (including `?token=`) in the background. Events
    /// arrive on the returned receiver until the handle is dropped or the
    /// policy gives up.
    pub fn spawn(url: impl Into<String>, policy: ReconnectPolicy) -> (Self, mpsc::Receiver<SocketEvent>) {
        Self::start(url.into(), policy, None)
    }

    /// Like [`spawn`](Self::spawn), but the first handshake happens before
    /// returning. A refused connection or a rejected token comes back as
    /// [`ClientError::Socket`] instead of being retried.
    pub async fn connect(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Result<(Self, mpsc::Receiver<SocketEvent>)> {
        let url = url.into();
        let (stream, _) = connect_async(url.as_str()).await?;
        Ok(Self::start(url, policy, Some(stream)))
    }

    fn start(url: String, policy: ReconnectPolicy, open: Option<Socket>) -> (Self, mpsc::Receiver<SocketEvent>) {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (events_tx, events_rx) = mpsc::channel(64);
        let task = tokio::spawn(run(url, policy, open, commands_rx, events_tx));
        (Self { commands: commands_tx, task }, events_rx)
    }

    pub async fn ping(&self) -> Result<()> {
        self.send(ClientMessage::Ping).await
    }

    pub async fn mark_read(&self, notification_id: Uuid) -> Result<()> {
        self.send(ClientMessage::MarkRead { notification_id }).await
    }

    async fn send(&self, message: ClientMessage) -> Result<()> {
        self.commands.send(message).await.map_err(|_| ClientError::SocketClosed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for NotificationSocket {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    url: String,
    policy: ReconnectPolicy,
    mut open: Option<Socket>,
    mut commands: mpsc::Receiver<ClientMessage>,
    events: mpsc::Sender<SocketEvent>,
) {
    let mut attempt = 0u32;
    loop {
        let connected = match open.take() {
            Some(stream) => Ok(stream),
            None => connect_async(url.as_str()).await.map(|(stream, _)| stream),
        };
        match connected {
            Ok(stream) => {
                attempt = 0;
                info!("notification socket connected");
                if events.send(SocketEvent::Connected).await.is_err() {
                    return;
                }
                match session(stream, &mut commands, &events).await {
                    Exit::Shutdown => return,
                    Exit::Disconnected => {
                        if events.send(SocketEvent::Disconnected).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "notification socket connect failed"),
        }

        attempt += 1;
        if attempt > policy.max_attempts {
            warn!(attempts = policy.max_attempts, "giving up on notification socket");
            let _ = events.send(SocketEvent::GaveUp).await;
            return;
        }
        let delay = policy.delay(attempt);
        if events.send(SocketEvent::Reconnecting { attempt, delay }).await.is_err() {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn session(
    stream: Socket,
    commands: &mut mpsc::Receiver<ClientMessage>,
    events: &mpsc::Sender<SocketEvent>,
) -> Exit {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(message) => {
                            if events.send(SocketEvent::Message(message)).await.is_err() {
                                let _ = sink.close().await;
                                return Exit::Shutdown;
                            }
                        }
                        Err(e) => debug!(error = %e, "ignoring unknown frame"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Exit::Disconnected,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "notification socket read failed");
                    return Exit::Disconnected;
                }
            },
            command = commands.recv() => match command {
                Some(message) => {
                    let Ok(json) = serde_json::to_string(&message) else { continue };
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        return Exit::Disconnected;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return Exit::Shutdown;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<SocketEvent>) -> SocketEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for socket event")
            .expect("event channel closed")
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(16));
        assert_eq!(policy.delay(6), Duration::from_secs(30));
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        // Reserve a port, then free it so every connect is refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (_socket, mut events) = NotificationSocket::spawn(format!("ws://{addr}/ws"), fast_policy(2));
        assert_eq!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 1, delay: Duration::from_millis(10) }
        );
        assert_eq!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 2, delay: Duration::from_millis(20) }
        );
        assert_eq!(next_event(&mut events).await, SocketEvent::GaveUp);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_receives_frames_and_resets_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Two short-lived connections, each sending one frame then closing.
        let server = tokio::spawn(async move {
            for count in [3i64, 4] {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                let frame = serde_json::json!({ "type": "unread_count", "data": { "count": count } });
                ws.send(Message::Text(frame.to_string().into())).await.unwrap();
                ws.close(None).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            }
        });

        let (_socket, mut events) = NotificationSocket::spawn(format!("ws://{addr}/ws"), fast_policy(1));

        for count in [3i64, 4] {
            assert_eq!(next_event(&mut events).await, SocketEvent::Connected);
            assert_eq!(
                next_event(&mut events).await,
                SocketEvent::Message(ServerMessage::UnreadCount { count })
            );
            assert_eq!(next_event(&mut events).await, SocketEvent::Disconnected);
            // The counter starts over after every successful connection.
            assert_eq!(
                next_event(&mut events).await,
                SocketEvent::Reconnecting { attempt: 1, delay: Duration::from_millis(10) }
            );
        }

        server.await.unwrap();
        assert_eq!(next_event(&mut events).await, SocketEvent::GaveUp);
    }

    #[tokio::test]
    async fn test_connect_surfaces_handshake_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = NotificationSocket::connect(format!("ws://{addr}/ws"), fast_policy(3)).await;
        assert!(matches!(result, Err(ClientError::Socket(_))));
    }

    #[tokio::test]
    async fn test_connect_hands_open_stream_to_task() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let frame = serde_json::json!({ "type": "unread_count", "data": { "count": 7 } });
            ws.send(Message::Text(frame.to_string().into())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (_socket, mut events) =
            NotificationSocket::connect(format!("ws://{addr}/ws"), fast_policy(1)).await.unwrap();
        assert_eq!(next_event(&mut events).await, SocketEvent::Connected);
        assert_eq!(
            next_event(&mut events).await,
            SocketEvent::Message(ServerMessage::UnreadCount { count: 7 })
        );
    }

    #[tokio::test]
    async fn test_commands_reach_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, mut seen_rx) = mpsc::channel::<String>(4);

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(frame)) = ws.next().await {
                if let Message::Text(text) = frame {
                    let _ = seen_tx.send(text.as_str().to_string()).await;
                }
            }
        });

        let (socket, mut events) = NotificationSocket::spawn(format!("ws://{addr}/ws"), fast_policy(1));
        assert_eq!(next_event(&mut events).await, SocketEvent::Connected);

        let id = Uuid::nil();
        socket.ping().await.unwrap();
        socket.mark_read(id).await.unwrap();

        let ping: serde_json::Value = serde_json::from_str(&seen_rx.recv().await.unwrap()).unwrap();
        assert_eq!(ping, serde_json::json!({ "type": "ping" }));
        let mark: serde_json::Value = serde_json::from_str(&seen_rx.recv().await.unwrap()).unwrap();
        assert_eq!(
            mark,
            serde_json::json!({ "type": "mark_read", "data": { "notification_id": id } })
        );
    }
}
