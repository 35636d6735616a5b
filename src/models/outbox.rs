//! Outbox message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Durable at-least-once staging record for downstream events.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub message_type: String,
    /// JSON payload handed verbatim to the downstream bus.
    pub payload: String,
    pub is_processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Fields of an outbox message about to be written (inside the same
/// transaction as the state change that emitted it).
#[derive(Debug, Clone)]
pub struct NewOutboxMessage {
    pub message_type: String,
    pub payload: String,
}

impl NewOutboxMessage {
    pub fn new(message_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            payload: payload.into(),
        }
    }
}
