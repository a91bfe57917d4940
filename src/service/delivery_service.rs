//! Delivery pipeline: resolve, persist, then fan out live.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{DeliveryOutcome, Hub, Message, MessageId, UserId};
use crate::error::RelayError;
use crate::persistence::{DirectoryError, IdentityDirectory, MessageStore, StoreError, UserProfile};

/// Result of a successful send.
///
/// "Sent" means durably stored. `live` records what happened on the live
/// path and is informational only.
#[derive(Debug, Clone)]
pub struct Sent {
    /// The persisted message.
    pub message: Message,
    /// Outcome of the live-delivery attempt.
    pub live: DeliveryOutcome,
}

/// One row of a user's chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatListItem {
    /// The other participant.
    pub partner_id: UserId,
    /// Partner's username; empty if the directory no longer knows them.
    pub partner_name: String,
    /// Partner's phone number; empty if the directory no longer knows them.
    pub partner_number: String,
    /// Text of the most recent message.
    pub last_message: String,
    /// Creation time of the most recent message.
    pub last_message_at: DateTime<Utc>,
}

/// Orchestration layer for every chat message, whichever transport it
/// arrived on.
///
/// Every send follows the same order: resolve recipient → reject
/// self-send → persist (bounded by a timeout) → hand to the [`Hub`]. The
/// registry is only touched after persistence has completed.
#[derive(Debug, Clone)]
pub struct DeliveryService {
    hub: Arc<Hub>,
    directory: Arc<dyn IdentityDirectory>,
    store: Arc<dyn MessageStore>,
    persist_timeout: Duration,
}

impl DeliveryService {
    /// Creates a new `DeliveryService`.
    #[must_use]
    pub fn new(
        hub: Arc<Hub>,
        directory: Arc<dyn IdentityDirectory>,
        store: Arc<dyn MessageStore>,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            hub,
            directory,
            store,
            persist_timeout,
        }
    }

    /// Returns a reference to the inner [`Hub`].
    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Sends `text` from `sender` to the user owning `receiver_number`.
    ///
    /// # Errors
    ///
    /// - [`RelayError::RecipientNotFound`] if the number cannot be resolved.
    /// - [`RelayError::InvalidTarget`] if the recipient is the sender.
    /// - [`RelayError::PersistenceFailed`] if the store fails or times out.
    ///
    /// Nothing is persisted or delivered on any of these.
    pub async fn send(
        &self,
        sender: &UserId,
        receiver_number: &str,
        text: String,
    ) -> Result<Sent, RelayError> {
        let receiver = self.resolve(receiver_number).await?;
        if &receiver.id == sender {
            return Err(RelayError::InvalidTarget);
        }

        let message = Message::new(sender.clone(), receiver.id, text);
        self.bounded(self.store.append(&message)).await?;

        let live = self
            .hub
            .deliver(&message.receiver_id, message.clone())
            .await;
        tracing::debug!(
            message_id = %message.id,
            sender = %message.sender_id,
            receiver = %message.receiver_id,
            ?live,
            "message stored"
        );
        Ok(Sent { message, live })
    }

    /// Replaces the text of `message_id` on behalf of `editor`.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Unauthorized`] if no message with that id was sent
    ///   by `editor`, including when the id is not a valid message id.
    /// - [`RelayError::PersistenceFailed`] if the store fails or times out.
    pub async fn update_message(
        &self,
        message_id: &str,
        editor: &UserId,
        new_text: &str,
    ) -> Result<(), RelayError> {
        let id: MessageId = message_id
            .trim()
            .parse()
            .map_err(|_| RelayError::Unauthorized)?;

        let updated = self
            .bounded(self.store.update_text(id, editor, new_text, Utc::now()))
            .await?;
        if !updated {
            return Err(RelayError::Unauthorized);
        }
        tracing::info!(message_id = %id, editor = %editor, "message edited");
        Ok(())
    }

    /// Returns every message exchanged between `user` and the owner of
    /// `partner_number`, oldest first.
    ///
    /// # Errors
    ///
    /// - [`RelayError::RecipientNotFound`] if the number cannot be resolved.
    /// - [`RelayError::PersistenceFailed`] if the store fails or times out.
    pub async fn history(
        &self,
        user: &UserId,
        partner_number: &str,
    ) -> Result<Vec<Message>, RelayError> {
        let partner = self.resolve(partner_number).await?;
        self.bounded(self.store.conversation(user, &partner.id))
            .await
    }

    /// Returns the latest message with every partner of `user`, most
    /// recent first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceFailed`] if the store fails or
    /// times out.
    pub async fn chat_list(&self, user: &UserId) -> Result<Vec<ChatListItem>, RelayError> {
        let summaries = self.bounded(self.store.chat_partners(user)).await?;

        let mut items = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let profile = self.profile(&summary.partner_id).await;
            let (partner_name, partner_number) = profile
                .map(|p| (p.username, p.number))
                .unwrap_or_default();
            items.push(ChatListItem {
                partner_id: summary.partner_id,
                partner_name,
                partner_number,
                last_message: summary.last_message,
                last_message_at: summary.last_message_at,
            });
        }
        Ok(items)
    }

    /// Resolves a phone number through the identity directory.
    async fn resolve(&self, number: &str) -> Result<UserProfile, RelayError> {
        match tokio::time::timeout(self.persist_timeout, self.directory.find_by_number(number))
            .await
        {
            Ok(Ok(profile)) => Ok(profile),
            Ok(Err(DirectoryError::NotFound)) => Err(RelayError::RecipientNotFound),
            Ok(Err(DirectoryError::Backend(e))) => {
                tracing::warn!(error = %e, "identity directory lookup failed");
                Err(RelayError::RecipientNotFound)
            }
            Err(_) => {
                tracing::warn!("identity directory lookup timed out");
                Err(RelayError::RecipientNotFound)
            }
        }
    }

    /// Best-effort profile lookup for display fields.
    async fn profile(&self, id: &UserId) -> Option<UserProfile> {
        match tokio::time::timeout(self.persist_timeout, self.directory.find_by_id(id)).await {
            Ok(Ok(profile)) => Some(profile),
            Ok(Err(DirectoryError::NotFound)) => None,
            Ok(Err(DirectoryError::Backend(e))) => {
                tracing::warn!(partner = %id, error = %e, "profile lookup failed");
                None
            }
            Err(_) => {
                tracing::warn!(partner = %id, "profile lookup timed out");
                None
            }
        }
    }

    /// Runs a store call under the persistence timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, RelayError> {
        match tokio::time::timeout(self.persist_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RelayError::PersistenceFailed(e.to_string())),
            Err(_) => Err(RelayError::PersistenceFailed(format!(
                "store call exceeded {} ms",
                self.persist_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::SessionHandle;
    use crate::persistence::ChatSummary;
    use crate::persistence::memory::{InMemoryDirectory, InMemoryMessageStore};
    use async_trait::async_trait;

    const SEED: &str = "1:alice:0100000000,2:bob:0200000000";

    fn service_with_store(store: Arc<dyn MessageStore>) -> DeliveryService {
        DeliveryService::new(
            Arc::new(Hub::new()),
            Arc::new(InMemoryDirectory::from_seed(SEED)),
            store,
            Duration::from_millis(100),
        )
    }

    fn make_service() -> (DeliveryService, Arc<InMemoryMessageStore>) {
        let store = Arc::new(InMemoryMessageStore::new());
        (service_with_store(Arc::clone(&store) as Arc<dyn MessageStore>), store)
    }

    /// Store whose every call hangs past any reasonable timeout.
    #[derive(Debug)]
    struct StalledStore;

    #[async_trait]
    impl MessageStore for StalledStore {
        async fn append(&self, _: &Message) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
        async fn update_text(
            &self,
            _: MessageId,
            _: &UserId,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(true)
        }
        async fn conversation(&self, _: &UserId, _: &UserId) -> Result<Vec<Message>, StoreError> {
            Err(StoreError::Backend("down".to_string()))
        }
        async fn chat_partners(&self, _: &UserId) -> Result<Vec<ChatSummary>, StoreError> {
            Err(StoreError::Backend("down".to_string()))
        }
    }

    #[tokio::test]
    async fn offline_send_is_durable() {
        let (service, store) = make_service();
        let Ok(sent) = service.send(&"1".into(), "0200000000", "hi".to_string()).await else {
            panic!("send failed");
        };
        assert_eq!(sent.live, DeliveryOutcome::Offline);
        assert_eq!(store.len().await, 1);

        let Ok(history) = service.history(&"2".into(), "0100000000").await else {
            panic!("history failed");
        };
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().map(|m| m.text.as_str()), Some("hi"));
    }

    #[tokio::test]
    async fn online_recipient_gets_message_queued() {
        let (service, _store) = make_service();
        let (handle, mut rx) = SessionHandle::new("2".into(), 8);
        service.hub().register(Arc::new(handle)).await;

        let Ok(sent) = service.send(&"1".into(), "0200000000", "hi".to_string()).await else {
            panic!("send failed");
        };
        assert_eq!(sent.live, DeliveryOutcome::Delivered);
        let Ok(queued) = rx.try_recv() else {
            panic!("nothing queued");
        };
        assert_eq!(queued.id, sent.message.id);
        assert_eq!(queued.sender_id, UserId::from("1"));
    }

    #[tokio::test]
    async fn unknown_number_is_recipient_not_found() {
        let (service, store) = make_service();
        let result = service.send(&"1".into(), "0999999999", "hi".to_string()).await;
        assert!(matches!(result, Err(RelayError::RecipientNotFound)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn self_send_is_rejected_without_persisting() {
        let (service, store) = make_service();
        let result = service.send(&"1".into(), "0100000000", "me".to_string()).await;
        assert!(matches!(result, Err(RelayError::InvalidTarget)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn stalled_store_times_out_and_nothing_is_delivered() {
        let service = service_with_store(Arc::new(StalledStore));
        let (handle, mut rx) = SessionHandle::new("2".into(), 8);
        service.hub().register(Arc::new(handle)).await;

        let result = service.send(&"1".into(), "0200000000", "hi".to_string()).await;
        assert!(matches!(result, Err(RelayError::PersistenceFailed(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn store_failure_is_persistence_failed() {
        let service = service_with_store(Arc::new(StalledStore));
        let result = service.chat_list(&"1".into()).await;
        assert!(matches!(result, Err(RelayError::PersistenceFailed(_))));
    }

    #[tokio::test]
    async fn only_sender_may_edit() {
        let (service, store) = make_service();
        let Ok(sent) = service.send(&"1".into(), "0200000000", "hi".to_string()).await else {
            panic!("send failed");
        };
        let id = sent.message.id.to_string();

        let denied = service.update_message(&id, &"2".into(), "changed").await;
        assert_eq!(denied, Err(RelayError::Unauthorized));
        let Some(unchanged) = store.get(sent.message.id).await else {
            panic!("message missing");
        };
        assert_eq!(unchanged.text, "hi");
        assert!(!unchanged.edited);

        assert!(service.update_message(&id, &"1".into(), "hello").await.is_ok());
        let Some(edited) = store.get(sent.message.id).await else {
            panic!("message missing");
        };
        assert_eq!(edited.text, "hello");
        assert!(edited.edited);
        assert!(edited.edited_at.is_some());
    }

    #[tokio::test]
    async fn malformed_or_unknown_id_is_unauthorized() {
        let (service, _store) = make_service();
        assert_eq!(
            service.update_message("nope", &"1".into(), "x").await,
            Err(RelayError::Unauthorized)
        );
        assert_eq!(
            service
                .update_message(&MessageId::new().to_string(), &"1".into(), "x")
                .await,
            Err(RelayError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn chat_list_is_enriched_from_directory() {
        let (service, _store) = make_service();
        let _ = service.send(&"1".into(), "0200000000", "hi".to_string()).await;

        let Ok(list) = service.chat_list(&"1".into()).await else {
            panic!("chat list failed");
        };
        assert_eq!(list.len(), 1);
        let Some(item) = list.first() else {
            panic!("empty chat list");
        };
        assert_eq!(item.partner_id, UserId::from("2"));
        assert_eq!(item.partner_name, "bob");
        assert_eq!(item.partner_number, "0200000000");
        assert_eq!(item.last_message, "hi");
    }
}
