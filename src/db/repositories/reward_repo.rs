//! Reward repository

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{error::AppResult, models::Reward};

/// Repository for reward database operations
pub struct RewardRepository;

impl RewardRepository {
    /// Find rewards by id, preserving no particular order
    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> AppResult<Vec<Reward>> {
        let rewards = sqlx::query_as::<_, Reward>(
            r#"SELECT * FROM promo.reward WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(rewards)
    }

    /// Replace the global reward pool of a promotion
    pub async fn replace_promotion_rewards(
        conn: &mut PgConnection,
        promotion_id: &Uuid,
        reward_ids: &[Uuid],
    ) -> AppResult<()> {
        sqlx::query(r#"DELETE FROM promo.promotion_reward WHERE promotion_id = $1"#)
            .bind(promotion_id)
            .execute(&mut *conn)
            .await?;

        for reward_id in reward_ids {
            sqlx::query(
                r#"
                INSERT INTO promo.promotion_reward (promotion_id, reward_id)
                VALUES ($1, $2)
                ON CONFLICT (promotion_id, reward_id) DO NOTHING
                "#,
            )
            .bind(promotion_id)
            .bind(reward_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Link rewards to an expression group
    pub async fn link_group_rewards(
        conn: &mut PgConnection,
        group_id: &Uuid,
        reward_ids: &[Uuid],
    ) -> AppResult<()> {
        for reward_id in reward_ids {
            sqlx::query(
                r#"
                INSERT INTO promo.rule_group_reward (group_id, reward_id)
                VALUES ($1, $2)
                ON CONFLICT (group_id, reward_id) DO NOTHING
                "#,
            )
            .bind(group_id)
            .bind(reward_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Active rewards in a promotion's global pool
    pub async fn global_rewards(pool: &PgPool, promotion_id: &Uuid) -> AppResult<Vec<Reward>> {
        let rewards = sqlx::query_as::<_, Reward>(
            r#"
            SELECT r.* FROM promo.reward r
            JOIN promo.promotion_reward pr ON pr.reward_id = r.id
            WHERE pr.promotion_id = $1 AND r.is_active
            ORDER BY r.name
            "#,
        )
        .bind(promotion_id)
        .fetch_all(pool)
        .await?;

        Ok(rewards)
    }

    /// Active rewards linked to an expression group; overrides the global
    /// pool when non-empty
    pub async fn group_rewards(pool: &PgPool, group_id: &Uuid) -> AppResult<Vec<Reward>> {
        let rewards = sqlx::query_as::<_, Reward>(
            r#"
            SELECT r.* FROM promo.reward r
            JOIN promo.rule_group_reward gr ON gr.reward_id = r.id
            WHERE gr.group_id = $1 AND r.is_active
            ORDER BY r.name
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        Ok(rewards)
    }
}
