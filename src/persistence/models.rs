//! Rows returned by the external collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// A user as known to the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user identifier.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Phone number.
    pub number: String,
}

/// Latest message of one conversation, as aggregated by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    /// The other participant.
    pub partner_id: UserId,
    /// Text of the most recent message.
    pub last_message: String,
    /// Creation time of the most recent message.
    pub last_message_at: DateTime<Utc>,
}
