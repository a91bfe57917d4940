//! Message request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Message, UserId};

/// Request body for `POST /message`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Phone number of the recipient.
    pub receiver_number: String,
    /// Text body.
    pub message: String,
}

/// Response body for `POST /message`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageResponse {
    /// Echo of the stored text.
    pub message: String,
    /// Fixed confirmation string.
    pub status: String,
    /// Server-assigned message id.
    pub id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /update_message`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateMessageRequest {
    /// Id of the message to edit.
    pub id: String,
    /// Replacement text.
    pub new_message: String,
}

/// Response body for `POST /update_message`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateMessageResponse {
    /// Fixed confirmation string.
    pub status: String,
}

/// Request body for `POST /get_message`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HistoryRequest {
    /// Phone number of the other participant.
    pub sender_number: String,
}

/// One stored message as returned by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageDto {
    /// Message id.
    pub id: Uuid,
    /// Author.
    #[schema(value_type = String)]
    pub sender_id: UserId,
    /// Recipient.
    #[schema(value_type = String)]
    pub receiver_id: UserId,
    /// Text body.
    pub message: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether the text was edited.
    pub edited: bool,
    /// Time of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        Self {
            id: *m.id.as_uuid(),
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            message: m.text,
            created_at: m.created_at,
            edited: m.edited,
            edited_at: m.edited_at,
        }
    }
}
