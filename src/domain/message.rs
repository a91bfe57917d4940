//! Durable chat message record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Server-assigned unique identifier of a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    /// Creates a new random `MessageId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `MessageId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A chat message as stored in the durable store.
///
/// Immutable once persisted except for the edit fields, which only the
/// original sender may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    /// Server-assigned identifier.
    pub id: MessageId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Addressee of the message.
    pub receiver_id: UserId,
    /// Text body (replaced on edit).
    #[serde(rename = "message")]
    pub text: String,
    /// Creation timestamp assigned by the server.
    pub created_at: DateTime<Utc>,
    /// Whether the message has been edited.
    #[serde(default)]
    pub edited: bool,
    /// Timestamp of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Builds a fresh, unedited message stamped with the current time.
    #[must_use]
    pub fn new(sender_id: UserId, receiver_id: UserId, text: String) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            receiver_id,
            text,
            created_at: Utc::now(),
            edited: false,
            edited_at: None,
        }
    }

    /// Returns the other participant of the conversation from `user`'s view.
    #[must_use]
    pub fn partner_of(&self, user: &UserId) -> &UserId {
        if &self.sender_id == user {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// Returns `true` if the message belongs to the conversation between
    /// `a` and `b`, in either direction.
    #[must_use]
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender_id == a && &self.receiver_id == b)
            || (&self.sender_id == b && &self.receiver_id == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_is_unedited() {
        let msg = Message::new("1".into(), "2".into(), "hi".to_string());
        assert!(!msg.edited);
        assert!(msg.edited_at.is_none());
    }

    #[test]
    fn partner_is_the_other_side() {
        let msg = Message::new("1".into(), "2".into(), "hi".to_string());
        assert_eq!(msg.partner_of(&"1".into()), &UserId::from("2"));
        assert_eq!(msg.partner_of(&"2".into()), &UserId::from("1"));
    }

    #[test]
    fn conversation_membership_ignores_direction() {
        let msg = Message::new("1".into(), "2".into(), "hi".to_string());
        assert!(msg.is_between(&"2".into(), &"1".into()));
        assert!(!msg.is_between(&"1".into(), &"3".into()));
    }

    #[test]
    fn message_id_parses_from_uuid_string() {
        let id = MessageId::new();
        let parsed: Result<MessageId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
        assert!("not-a-uuid".parse::<MessageId>().is_err());
    }
}
