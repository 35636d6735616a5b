//! Outbox repository

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{NewOutboxMessage, OutboxMessage},
};

/// Repository for outbox database operations
pub struct OutboxRepository;

impl OutboxRepository {
    /// Insert an outbox message. Callers pass the transaction of the state
    /// change that emitted the event.
    pub async fn insert(
        conn: &mut PgConnection,
        message: &NewOutboxMessage,
    ) -> AppResult<OutboxMessage> {
        let row = sqlx::query_as::<_, OutboxMessage>(
            r#"
            INSERT INTO infrastructure.outbox_message (message_type, payload)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&message.message_type)
        .bind(&message.payload)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    /// Unprocessed messages, oldest first
    pub async fn fetch_unprocessed(pool: &PgPool, limit: i64) -> AppResult<Vec<OutboxMessage>> {
        let messages = sqlx::query_as::<_, OutboxMessage>(
            r#"
            SELECT * FROM infrastructure.outbox_message
            WHERE NOT is_processed
            ORDER BY occurred_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Mark a message processed after it was handed to the downstream bus
    pub async fn mark_processed(pool: &PgPool, id: &Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE infrastructure.outbox_message
            SET is_processed = TRUE, processed_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }
}
