//! Conversation and message persistence.
//!
//! Messages are immutable once written.  A message belongs to a conversation
//! through `conversation_message_links`; the pair insert and the
//! conversation delete each run in a single transaction.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    #[sqlx(rename = "message_type")]
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    pool: PgPool,
}

impl ConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mint and persist a new conversation; returns its id.
    pub async fn create(&self) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO conversations (id, summary, created_at) VALUES ($1, '', $2)")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("registering conversation")?;
        Ok(id)
    }

    pub async fn exists(&self, conversation_id: Uuid) -> Result<bool> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn ids(&self) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM conversations ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Every message linked to the conversation, oldest first.
    pub async fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.message_type, m.content, m.timestamp
            FROM messages m
            JOIN conversation_message_links l ON l.message_id = m.id
            WHERE l.conversation_id = $1
            ORDER BY m.timestamp ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Persist one user/assistant exchange and its link rows atomically.
    pub async fn append_pair(
        &self,
        conversation_id: Uuid,
        user_content: &str,
        assistant_content: &str,
    ) -> Result<()> {
        let user_id = Uuid::new_v4();
        let assistant_id = Uuid::new_v4();
        let user_ts = Utc::now();
        // The assistant message must sort strictly after the user message so
        // timestamp ordering reproduces turn order.
        let assistant_ts = user_ts + Duration::microseconds(1);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO messages (id, message_type, content, timestamp) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(ROLE_USER)
        .bind(user_content)
        .bind(user_ts)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO messages (id, message_type, content, timestamp) VALUES ($1, $2, $3, $4)",
        )
        .bind(assistant_id)
        .bind(ROLE_ASSISTANT)
        .bind(assistant_content)
        .bind(assistant_ts)
        .execute(&mut *tx)
        .await?;

        for message_id in [user_id, assistant_id] {
            sqlx::query(
                "INSERT INTO conversation_message_links (conversation_id, message_id) VALUES ($1, $2)",
            )
            .bind(conversation_id)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("committing message pair")?;
        Ok(())
    }

    /// Delete the conversation, its messages, and its link rows in one
    /// transaction.  Unrelated conversations are untouched.
    pub async fn delete(&self, conversation_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let message_ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT message_id FROM conversation_message_links WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_all(&mut *tx)
        .await?;

        if !message_ids.is_empty() {
            let ids: Vec<Uuid> = message_ids.into_iter().map(|(id,)| id).collect();
            sqlx::query("DELETE FROM messages WHERE id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM conversation_message_links WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.context("committing conversation delete")?;
        info!(%conversation_id, "conversation deleted");
        Ok(())
    }

    /// Best-effort write of the rolling summary; the in-process cache stays
    /// authoritative for the session's lifetime.
    pub async fn update_summary(&self, conversation_id: Uuid, summary: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET summary = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(summary)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
