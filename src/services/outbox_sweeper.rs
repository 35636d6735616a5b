//! Outbox sweeper
//!
//! Background worker draining the outbox to a Redis Stream. A lease-like
//! single-owner lock keeps one sweeper active across replicas; delivery is
//! at-least-once and failures back off exponentially.

use std::time::Duration;

use redis::aio::ConnectionManager;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::OutboxConfig,
    constants::OUTBOX_MAX_BACKOFF_SECS,
    db::repositories::OutboxRepository,
    error::AppResult,
    models::OutboxMessage,
};

const LEASE_KEY: &str = "outbox:sweeper:lease";

/// Outbox sweeper worker.
pub struct OutboxSweeper {
    pool: PgPool,
    redis: ConnectionManager,
    config: OutboxConfig,
    instance_id: String,
}

impl OutboxSweeper {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: OutboxConfig) -> Self {
        Self {
            pool,
            redis,
            config,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Run forever. Spawn this on its own task.
    pub async fn run(self) {
        tracing::info!(instance = %self.instance_id, "Outbox sweeper started");

        let mut interval = tokio::time::interval(self.config.sweep_interval);
        let mut backoff = Duration::from_secs(1);

        loop {
            interval.tick().await;

            match self.holds_lease().await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!("Sweeper lease check failed: {}", e);
                    continue;
                }
            }

            match self.sweep_batch().await {
                Ok(0) => {
                    backoff = Duration::from_secs(1);
                }
                Ok(swept) => {
                    tracing::info!(swept, "Outbox sweep completed");
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    tracing::error!("Outbox sweep failed, backing off {:?}: {}", backoff, e);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(OUTBOX_MAX_BACKOFF_SECS));
                }
            }
        }
    }

    /// Acquire or renew the single-owner lease.
    async fn holds_lease(&self) -> AppResult<bool> {
        let mut conn = self.redis.clone();
        let ttl_secs = (self.config.sweep_interval.as_secs() * 2).max(2);

        let acquired: Option<String> = redis::cmd("SET")
            .arg(LEASE_KEY)
            .arg(&self.instance_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        if acquired.is_some() {
            return Ok(true);
        }

        // Renew when we already hold it.
        let owner: Option<String> = redis::cmd("GET")
            .arg(LEASE_KEY)
            .query_async(&mut conn)
            .await?;
        if owner.as_deref() == Some(self.instance_id.as_str()) {
            let _: () = redis::cmd("EXPIRE")
                .arg(LEASE_KEY)
                .arg(ttl_secs)
                .query_async(&mut conn)
                .await?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Drain one batch oldest-first. Each message is handed to the bus, then
    /// marked processed; a crash in between re-delivers (at-least-once).
    async fn sweep_batch(&self) -> AppResult<usize> {
        let messages =
            OutboxRepository::fetch_unprocessed(&self.pool, self.config.batch_size).await?;

        let mut swept = 0;
        for message in &messages {
            self.publish_to_bus(message).await?;
            OutboxRepository::mark_processed(&self.pool, &message.id).await?;
            swept += 1;
        }

        Ok(swept)
    }

    async fn publish_to_bus(&self, message: &OutboxMessage) -> AppResult<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("XADD")
            .arg(&self.config.stream)
            .arg("*")
            .arg("id")
            .arg(message.id.to_string())
            .arg("type")
            .arg(&message.message_type)
            .arg("occurredAt")
            .arg(message.occurred_at.to_rfc3339())
            .arg("payload")
            .arg(&message.payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
