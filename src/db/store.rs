//! Promotion store seam
//!
//! The runtime services (provider, evaluator, grant service) read and write
//! through this trait so tests can substitute in-memory fakes. The Postgres
//! implementation delegates to the repositories and owns the transaction
//! boundary for grant writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::repositories::{
        GrantRepository, OutboxRepository, PromotionRepository, RewardRepository, TierRepository,
    },
    error::AppResult,
    models::{
        ContactReward, NewGrant, NewOutboxMessage, Promotion, PromotionVersion,
        RuleExpressionGroup, RuleTier, Reward,
    },
};

/// Read/write surface the runtime evaluation path depends on.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Published versions active in a country at `t`, with their promotions,
    /// ordered by promotion id.
    async fn active_versions(
        &self,
        country_iso: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<(Promotion, PromotionVersion)>>;

    /// Slow-changing promotion metadata.
    async fn find_promotion(&self, id: Uuid) -> AppResult<Option<Promotion>>;

    /// Tiers ordered by `(tier_level, sort_order)`.
    async fn tiers_for_promotion(&self, promotion_id: Uuid) -> AppResult<Vec<RuleTier>>;

    /// Groups ordered by `sort_order`.
    async fn groups_for_tier(&self, tier_id: Uuid) -> AppResult<Vec<RuleExpressionGroup>>;

    async fn global_rewards(&self, promotion_id: Uuid) -> AppResult<Vec<Reward>>;

    async fn group_rewards(&self, group_id: Uuid) -> AppResult<Vec<Reward>>;

    async fn last_granted(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
    ) -> AppResult<Option<ContactReward>>;

    async fn last_granted_for_tier(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
        tier_level: i32,
    ) -> AppResult<Option<ContactReward>>;

    async fn has_granted_for_event(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
        source_event_id: &str,
    ) -> AppResult<bool>;

    /// Persist a batch of grants and, when present, the outbox message that
    /// announces them, in one transaction.
    async fn record_grants(
        &self,
        grants: &[NewGrant],
        outbox: Option<NewOutboxMessage>,
    ) -> AppResult<Vec<ContactReward>>;
}

/// Postgres-backed store
pub struct PgPromotionStore {
    pool: PgPool,
}

impl PgPromotionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromotionStore for PgPromotionStore {
    async fn active_versions(
        &self,
        country_iso: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<(Promotion, PromotionVersion)>> {
        PromotionRepository::active_versions(&self.pool, country_iso, at).await
    }

    async fn find_promotion(&self, id: Uuid) -> AppResult<Option<Promotion>> {
        PromotionRepository::find_by_id(&self.pool, &id).await
    }

    async fn tiers_for_promotion(&self, promotion_id: Uuid) -> AppResult<Vec<RuleTier>> {
        TierRepository::tiers_for_promotion(&self.pool, &promotion_id).await
    }

    async fn groups_for_tier(&self, tier_id: Uuid) -> AppResult<Vec<RuleExpressionGroup>> {
        TierRepository::groups_for_tier(&self.pool, &tier_id).await
    }

    async fn global_rewards(&self, promotion_id: Uuid) -> AppResult<Vec<Reward>> {
        RewardRepository::global_rewards(&self.pool, &promotion_id).await
    }

    async fn group_rewards(&self, group_id: Uuid) -> AppResult<Vec<Reward>> {
        RewardRepository::group_rewards(&self.pool, &group_id).await
    }

    async fn last_granted(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
    ) -> AppResult<Option<ContactReward>> {
        GrantRepository::last_granted(&self.pool, contact_id, &promotion_id).await
    }

    async fn last_granted_for_tier(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
        tier_level: i32,
    ) -> AppResult<Option<ContactReward>> {
        GrantRepository::last_granted_for_tier(&self.pool, contact_id, &promotion_id, tier_level)
            .await
    }

    async fn has_granted_for_event(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
        source_event_id: &str,
    ) -> AppResult<bool> {
        GrantRepository::exists_granted_for_event(
            &self.pool,
            contact_id,
            &promotion_id,
            source_event_id,
        )
        .await
    }

    async fn record_grants(
        &self,
        grants: &[NewGrant],
        outbox: Option<NewOutboxMessage>,
    ) -> AppResult<Vec<ContactReward>> {
        let mut tx = self.pool.begin().await?;

        let mut written = Vec::with_capacity(grants.len());
        for grant in grants {
            written.push(GrantRepository::insert(&mut tx, grant).await?);
        }
        if let Some(message) = outbox {
            OutboxRepository::insert(&mut tx, &message).await?;
        }

        tx.commit().await?;
        Ok(written)
    }
}
