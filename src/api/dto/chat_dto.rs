//! Chat list DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::UserId;
use crate::service::ChatListItem;

/// One entry of `GET /chat_list`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatListEntryDto {
    /// The other participant.
    #[schema(value_type = String)]
    pub partner_id: UserId,
    /// Partner's username, empty if unknown.
    pub partner_name: String,
    /// Partner's phone number, empty if unknown.
    pub partner_number: String,
    /// Most recent message text.
    pub last_message: String,
    /// Time of the most recent message.
    pub last_message_at: DateTime<Utc>,
}

impl From<ChatListItem> for ChatListEntryDto {
    fn from(item: ChatListItem) -> Self {
        Self {
            partner_id: item.partner_id,
            partner_name: item.partner_name,
            partner_number: item.partner_number,
            last_message: item.last_message,
            last_message_at: item.last_message_at,
        }
    }
}
