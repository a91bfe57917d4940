//! Persistence layer: the identity directory and the durable message store.
//!
//! Both collaborators sit behind object-safe traits so the relay can run
//! against PostgreSQL ([`postgres`]) or fully in memory ([`memory`], used
//! by tests and by `PERSISTENCE_ENABLED=false`).

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Message, MessageId, UserId};
pub use models::{ChatSummary, UserProfile};

/// Failure of an identity-directory lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// No user matches the key.
    #[error("user not found")]
    NotFound,
    /// The directory backend failed.
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Failure of the durable message store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store backend failed.
    #[error("message store error: {0}")]
    Backend(String),
}

/// Resolves phone numbers and ids to user profiles.
#[async_trait]
pub trait IdentityDirectory: Send + Sync + std::fmt::Debug {
    /// Looks up a user by phone number.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::NotFound`] if no user has that number.
    async fn find_by_number(&self, number: &str) -> Result<UserProfile, DirectoryError>;

    /// Looks up a user by id.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::NotFound`] if the id is unknown.
    async fn find_by_id(&self, id: &UserId) -> Result<UserProfile, DirectoryError>;
}

/// Append-mostly store of chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Persists a new message.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on I/O failure.
    async fn append(&self, message: &Message) -> Result<(), StoreError>;

    /// Replaces the text of `id` if and only if it was sent by `sender`,
    /// setting the edited flag and timestamp. Returns `false` when no such
    /// message exists.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on I/O failure.
    async fn update_text(
        &self,
        id: MessageId,
        sender: &UserId,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Returns every message between `a` and `b`, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on I/O failure.
    async fn conversation(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>, StoreError>;

    /// Returns the latest message per conversation partner of `user`,
    /// most recent first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on I/O failure.
    async fn chat_partners(&self, user: &UserId) -> Result<Vec<ChatSummary>, StoreError>;
}
