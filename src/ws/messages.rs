//! WebSocket frame types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Message, UserId};

/// Client → server chat frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// Phone number of the recipient.
    pub receiver_number: String,
    /// Text body.
    pub message: String,
}

/// Server → client chat frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Author of the message.
    pub sender_id: UserId,
    /// Text body.
    pub message: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for OutboundFrame {
    fn from(message: &Message) -> Self {
        Self {
            sender_id: message.sender_id.clone(),
            message: message.text.clone(),
            created_at: message.created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frame_parses_wire_shape() {
        let Ok(frame) = serde_json::from_str::<InboundFrame>(
            r#"{"receiver_number":"0200000000","message":"hi"}"#,
        ) else {
            panic!("parse failed");
        };
        assert_eq!(frame.receiver_number, "0200000000");
        assert_eq!(frame.message, "hi");
    }

    #[test]
    fn inbound_frame_rejects_missing_fields() {
        assert!(serde_json::from_str::<InboundFrame>(r#"{"message":"hi"}"#).is_err());
    }

    #[test]
    fn outbound_frame_has_exactly_three_fields() {
        let msg = Message::new("1".into(), "2".into(), "hi".to_string());
        let Ok(value) = serde_json::to_value(OutboundFrame::from(&msg)) else {
            panic!("serialize failed");
        };
        let Some(obj) = value.as_object() else {
            panic!("expected object");
        };
        assert_eq!(obj.len(), 3);
        assert_eq!(obj.get("sender_id").and_then(|v| v.as_str()), Some("1"));
        assert_eq!(obj.get("message").and_then(|v| v.as_str()), Some("hi"));
        assert!(obj.get("created_at").is_some_and(|v| v.is_string()));
    }
}
