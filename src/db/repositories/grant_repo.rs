//! Contact-reward (grant) repository

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    constants::grant_statuses,
    error::{AppError, AppResult},
    models::{ContactReward, GrantStatus, NewGrant},
};

/// Repository for grant database operations
pub struct GrantRepository;

impl GrantRepository {
    /// Insert one grant row
    pub async fn insert(conn: &mut PgConnection, grant: &NewGrant) -> AppResult<ContactReward> {
        let row = sqlx::query_as::<_, ContactReward>(
            r#"
            INSERT INTO promo.contact_reward (
                contact_id, promotion_id, reward_id, expression_group_id, tier_level,
                granted_at, status, granted_amount, granted_unit, cooldown_until, source_event_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&grant.contact_id)
        .bind(grant.promotion_id)
        .bind(grant.reward_id)
        .bind(grant.expression_group_id)
        .bind(grant.tier_level)
        .bind(grant.granted_at)
        .bind(grant_statuses::PENDING)
        .bind(grant.granted_amount)
        .bind(&grant.granted_unit)
        .bind(grant.cooldown_until)
        .bind(&grant.source_event_id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    /// Most recent granted reward for `(contact, promotion)`
    pub async fn last_granted(
        pool: &PgPool,
        contact_id: &str,
        promotion_id: &Uuid,
    ) -> AppResult<Option<ContactReward>> {
        let row = sqlx::query_as::<_, ContactReward>(
            r#"
            SELECT * FROM promo.contact_reward
            WHERE contact_id = $1 AND promotion_id = $2 AND status = $3
            ORDER BY granted_at DESC
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .bind(promotion_id)
        .bind(grant_statuses::GRANTED)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Most recent granted reward for `(contact, promotion, tier_level)`
    pub async fn last_granted_for_tier(
        pool: &PgPool,
        contact_id: &str,
        promotion_id: &Uuid,
        tier_level: i32,
    ) -> AppResult<Option<ContactReward>> {
        let row = sqlx::query_as::<_, ContactReward>(
            r#"
            SELECT * FROM promo.contact_reward
            WHERE contact_id = $1 AND promotion_id = $2 AND tier_level = $3 AND status = $4
            ORDER BY granted_at DESC
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .bind(promotion_id)
        .bind(tier_level)
        .bind(grant_statuses::GRANTED)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Idempotency probe: does a granted reward exist for this event?
    pub async fn exists_granted_for_event(
        pool: &PgPool,
        contact_id: &str,
        promotion_id: &Uuid,
        source_event_id: &str,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM promo.contact_reward
                WHERE contact_id = $1 AND promotion_id = $2
                  AND source_event_id = $3 AND status = $4
            )
            "#,
        )
        .bind(contact_id)
        .bind(promotion_id)
        .bind(source_event_id)
        .bind(grant_statuses::GRANTED)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Transition a grant's status, enforcing the domain state machine.
    ///
    /// Returns the updated row, or `Ok(None)` when a concurrent writer
    /// already granted the same event (the partial unique index fires and
    /// this writer's transition is a no-op per the concurrency contract).
    pub async fn update_status(
        pool: &PgPool,
        id: &Uuid,
        next: GrantStatus,
    ) -> AppResult<Option<ContactReward>> {
        let current = sqlx::query_as::<_, ContactReward>(
            r#"SELECT * FROM promo.contact_reward WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Grant not found".to_string()))?;

        if !current.grant_status().can_transition_to(next) {
            return Err(AppError::IllegalTransition(format!(
                "{} -> {}",
                current.status, next
            )));
        }

        let updated = sqlx::query_as::<_, ContactReward>(
            r#"
            UPDATE promo.contact_reward
            SET status = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.to_string())
        .fetch_one(pool)
        .await;

        match updated {
            Ok(row) => Ok(Some(row)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::warn!(grant_id = %id, "Concurrent grant already recorded for this event; treating transition as a no-op");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
