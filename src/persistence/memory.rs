//! In-memory collaborators for tests and database-less local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ChatSummary, DirectoryError, IdentityDirectory, MessageStore, StoreError, UserProfile};
use crate::domain::{Message, MessageId, UserId};

/// Identity directory backed by a fixed set of profiles.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<Vec<UserProfile>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a seed of `id:username:number` entries separated by commas.
    /// Entries that do not have exactly three fields are skipped.
    #[must_use]
    pub fn from_seed(seed: &str) -> Self {
        let users = seed
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.trim().splitn(3, ':');
                let id = parts.next().filter(|s| !s.is_empty())?;
                let username = parts.next()?;
                let number = parts.next().filter(|s| !s.is_empty())?;
                Some(UserProfile {
                    id: UserId::from(id),
                    username: username.to_string(),
                    number: number.to_string(),
                })
            })
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// Adds (or replaces by id) a profile.
    pub async fn insert(&self, profile: UserProfile) {
        let mut users = self.users.write().await;
        users.retain(|u| u.id != profile.id);
        users.push(profile);
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn find_by_number(&self, number: &str) -> Result<UserProfile, DirectoryError> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.number == number)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<UserProfile, DirectoryError> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }
}

/// Message store holding every message in a vector, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Returns a copy of the message with the given id.
    pub async fn get(&self, id: MessageId) -> Option<Message> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn update_text(
        &self,
        id: MessageId,
        sender: &UserId,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut messages = self.messages.write().await;
        let Some(message) = messages
            .iter_mut()
            .find(|m| m.id == id && &m.sender_id == sender)
        else {
            return Ok(false);
        };
        message.text = text.to_string();
        message.edited = true;
        message.edited_at = Some(edited_at);
        Ok(true)
    }

    async fn conversation(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>, StoreError> {
        let mut found: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn chat_partners(&self, user: &UserId) -> Result<Vec<ChatSummary>, StoreError> {
        let messages = self.messages.read().await;
        let mut latest: HashMap<&UserId, &Message> = HashMap::new();
        for message in messages
            .iter()
            .filter(|m| &m.sender_id == user || &m.receiver_id == user)
        {
            let partner = message.partner_of(user);
            match latest.get(partner) {
                Some(seen) if seen.created_at > message.created_at => {}
                _ => {
                    latest.insert(partner, message);
                }
            }
        }

        let mut summaries: Vec<ChatSummary> = latest
            .into_iter()
            .map(|(partner, m)| ChatSummary {
                partner_id: partner.clone(),
                last_message: m.text.clone(),
                last_message_at: m.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(summaries)
    }
}
