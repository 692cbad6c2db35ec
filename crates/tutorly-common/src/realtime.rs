//! Frames exchanged over `/ws/notifications`.
//!
//! Both directions are JSON `{"type": ..., "data": ...}`. The server and
//! the client share these definitions so the two ends cannot drift. The
//! notification payload is a parameter because its row type lives in the
//! database crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server → client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage<N> {
    Notification(N),
    UnreadCount { count: i64 },
    MarkReadResponse { notification_id: Uuid, success: bool },
    Pong { timestamp: DateTime<Utc> },
    Error { message: String },
}

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    MarkRead { notification_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_frames_rejected() {
        assert!(serde_json::from_value::<ClientMessage>(json!({ "type": "subscribe" })).is_err());
        assert!(serde_json::from_value::<ServerMessage<()>>(json!({ "type": "pong" })).is_err());
    }

    #[test]
    fn test_notification_payload_is_generic() {
        let frame: ServerMessage<String> =
            serde_json::from_value(json!({ "type": "notification", "data": "hello" })).unwrap();
        assert_eq!(frame, ServerMessage::Notification("hello".to_string()));
    }
}
