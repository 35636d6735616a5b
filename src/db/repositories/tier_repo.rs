//! Tier and expression-group repository

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{RuleExpressionGroup, RuleTier},
};

/// Repository for tier and group database operations
pub struct TierRepository;

impl TierRepository {
    /// Delete a promotion's entire tier/group tree. A new draft version
    /// rewrites the tree in the same transaction.
    pub async fn delete_for_promotion(
        conn: &mut PgConnection,
        promotion_id: &Uuid,
    ) -> AppResult<()> {
        sqlx::query(r#"DELETE FROM promo.rule_tier WHERE promotion_id = $1"#)
            .bind(promotion_id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Insert a tier
    pub async fn insert_tier(
        conn: &mut PgConnection,
        promotion_id: &Uuid,
        tier_level: i32,
        sort_order: i32,
        cooldown_days: Option<i32>,
    ) -> AppResult<RuleTier> {
        let tier = sqlx::query_as::<_, RuleTier>(
            r#"
            INSERT INTO promo.rule_tier (promotion_id, tier_level, sort_order, cooldown_days)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(promotion_id)
        .bind(tier_level)
        .bind(sort_order)
        .bind(cooldown_days)
        .fetch_one(conn)
        .await?;

        Ok(tier)
    }

    /// Insert an expression group
    pub async fn insert_group(
        conn: &mut PgConnection,
        promotion_id: &Uuid,
        tier_id: &Uuid,
        sort_order: i32,
        expression_payload: &str,
    ) -> AppResult<RuleExpressionGroup> {
        let group = sqlx::query_as::<_, RuleExpressionGroup>(
            r#"
            INSERT INTO promo.rule_expression_group (promotion_id, tier_id, sort_order, expression_payload)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(promotion_id)
        .bind(tier_id)
        .bind(sort_order)
        .bind(expression_payload)
        .fetch_one(conn)
        .await?;

        Ok(group)
    }

    /// Tiers for a promotion, ordered by `(tier_level, sort_order)`
    pub async fn tiers_for_promotion(
        pool: &PgPool,
        promotion_id: &Uuid,
    ) -> AppResult<Vec<RuleTier>> {
        let tiers = sqlx::query_as::<_, RuleTier>(
            r#"
            SELECT * FROM promo.rule_tier
            WHERE promotion_id = $1
            ORDER BY tier_level, sort_order
            "#,
        )
        .bind(promotion_id)
        .fetch_all(pool)
        .await?;

        Ok(tiers)
    }

    /// Groups for a tier, ordered by `sort_order`
    pub async fn groups_for_tier(pool: &PgPool, tier_id: &Uuid) -> AppResult<Vec<RuleExpressionGroup>> {
        let groups = sqlx::query_as::<_, RuleExpressionGroup>(
            r#"
            SELECT * FROM promo.rule_expression_group
            WHERE tier_id = $1
            ORDER BY sort_order
            "#,
        )
        .bind(tier_id)
        .fetch_all(pool)
        .await?;

        Ok(groups)
    }
}
