//! PostgreSQL implementation of the identity directory and message store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::{ChatSummary, DirectoryError, IdentityDirectory, MessageStore, StoreError, UserProfile};
use crate::config::RelayConfig;
use crate::domain::{Message, MessageId, UserId};

type MessageRow = (
    Uuid,
    String,
    String,
    String,
    DateTime<Utc>,
    bool,
    Option<DateTime<Utc>>,
);

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, message, created_at, edited, edited_at";

/// PostgreSQL-backed persistence using `sqlx::PgPool`.
///
/// Reads users from the `users` table owned by the identity service and
/// owns the `messages` table.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a persistence layer over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns the `sqlx` error if the database is unreachable.
    pub async fn connect(config: &RelayConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations under `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns the migration error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn into_message(row: MessageRow) -> Message {
    let (id, sender_id, receiver_id, text, created_at, edited, edited_at) = row;
    Message {
        id: MessageId::from_uuid(id),
        sender_id: UserId::new(sender_id),
        receiver_id: UserId::new(receiver_id),
        text,
        created_at,
        edited,
        edited_at,
    }
}

async fn fetch_user(
    pool: &PgPool,
    sql: &str,
    key: &str,
) -> Result<UserProfile, DirectoryError> {
    let row = sqlx::query_as::<_, (String, String, String)>(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| DirectoryError::Backend(e.to_string()))?;

    let (id, username, number) = row.ok_or(DirectoryError::NotFound)?;
    Ok(UserProfile {
        id: UserId::new(id),
        username,
        number,
    })
}

#[async_trait]
impl IdentityDirectory for PostgresPersistence {
    async fn find_by_number(&self, number: &str) -> Result<UserProfile, DirectoryError> {
        fetch_user(
            &self.pool,
            "SELECT id::text, username, number FROM users WHERE number = $1",
            number,
        )
        .await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<UserProfile, DirectoryError> {
        fetch_user(
            &self.pool,
            "SELECT id::text, username, number FROM users WHERE id::text = $1",
            id.as_str(),
        )
        .await
    }
}

#[async_trait]
impl MessageStore for PostgresPersistence {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, receiver_id, message, created_at, edited, edited_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(*message.id.as_uuid())
        .bind(message.sender_id.as_str())
        .bind(message.receiver_id.as_str())
        .bind(&message.text)
        .bind(message.created_at)
        .bind(message.edited)
        .bind(message.edited_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn update_text(
        &self,
        id: MessageId,
        sender: &UserId,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE messages SET message = $1, edited = TRUE, edited_at = $2 \
             WHERE id = $3 AND sender_id = $4",
        )
        .bind(text)
        .bind(edited_at)
        .bind(*id.as_uuid())
        .bind(sender.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn conversation(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(a.as_str())
            .bind(b.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(into_message).collect())
    }

    async fn chat_partners(&self, user: &UserId) -> Result<Vec<ChatSummary>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT partner_id, message, created_at FROM ( \
                 SELECT DISTINCT ON (partner_id) partner_id, message, created_at FROM ( \
                     SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS partner_id, \
                            message, created_at \
                     FROM messages WHERE sender_id = $1 OR receiver_id = $1 \
                 ) conv \
                 ORDER BY partner_id, created_at DESC \
             ) latest ORDER BY created_at DESC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|(partner_id, last_message, last_message_at)| ChatSummary {
                partner_id: UserId::new(partner_id),
                last_message,
                last_message_at,
            })
            .collect())
    }
}
