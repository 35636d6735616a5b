//! Promotion and promotion-version repository

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Promotion, PromotionVersion},
};

/// Repository for promotion database operations
pub struct PromotionRepository;

impl PromotionRepository {
    /// Create a new promotion
    pub async fn create(
        conn: &mut PgConnection,
        name: &str,
        timezone: &str,
        global_cooldown_days: i32,
    ) -> AppResult<Promotion> {
        let promotion = sqlx::query_as::<_, Promotion>(
            r#"
            INSERT INTO promo.promotion (name, timezone, global_cooldown_days)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(timezone)
        .bind(global_cooldown_days)
        .fetch_one(conn)
        .await?;

        Ok(promotion)
    }

    /// Update a promotion's slow-changing metadata
    pub async fn update(
        conn: &mut PgConnection,
        id: &Uuid,
        name: &str,
        timezone: &str,
        global_cooldown_days: i32,
    ) -> AppResult<Promotion> {
        let promotion = sqlx::query_as::<_, Promotion>(
            r#"
            UPDATE promo.promotion
            SET name = $2, timezone = $3, global_cooldown_days = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(timezone)
        .bind(global_cooldown_days)
        .fetch_one(conn)
        .await?;

        Ok(promotion)
    }

    /// Find promotion by ID
    pub async fn find_by_id(pool: &PgPool, id: &Uuid) -> AppResult<Option<Promotion>> {
        let promotion =
            sqlx::query_as::<_, Promotion>(r#"SELECT * FROM promo.promotion WHERE id = $1"#)
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(promotion)
    }

    /// Next version number for `(promotion, country)`: MAX(version) + 1
    pub async fn next_version(
        conn: &mut PgConnection,
        promotion_id: &Uuid,
        country_iso: &str,
    ) -> AppResult<i32> {
        let max: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT MAX(version) FROM promo.promotion_version
            WHERE promotion_id = $1 AND country_iso = $2
            "#,
        )
        .bind(promotion_id)
        .bind(country_iso)
        .fetch_one(conn)
        .await?;

        Ok(max.unwrap_or(0) + 1)
    }

    /// Insert a new draft version
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_version(
        conn: &mut PgConnection,
        promotion_id: &Uuid,
        version: i32,
        country_iso: &str,
        workflow_payload: &str,
        manifest_payload: &str,
        timezone: &str,
        global_cooldown_days: i32,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
    ) -> AppResult<PromotionVersion> {
        let created = sqlx::query_as::<_, PromotionVersion>(
            r#"
            INSERT INTO promo.promotion_version (
                promotion_id, version, country_iso, is_draft, workflow_payload,
                manifest_payload, timezone, global_cooldown_days, valid_from, valid_to
            )
            VALUES ($1, $2, $3, TRUE, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(promotion_id)
        .bind(version)
        .bind(country_iso)
        .bind(workflow_payload)
        .bind(manifest_payload)
        .bind(timezone)
        .bind(global_cooldown_days)
        .bind(valid_from)
        .bind(valid_to)
        .fetch_one(conn)
        .await?;

        Ok(created)
    }

    /// Latest version (draft or published) for `(promotion, country)`
    pub async fn latest_version(
        pool: &PgPool,
        promotion_id: &Uuid,
        country_iso: &str,
    ) -> AppResult<Option<PromotionVersion>> {
        let version = sqlx::query_as::<_, PromotionVersion>(
            r#"
            SELECT * FROM promo.promotion_version
            WHERE promotion_id = $1 AND country_iso = $2
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(promotion_id)
        .bind(country_iso)
        .fetch_optional(pool)
        .await?;

        Ok(version)
    }

    /// Find a specific version row
    pub async fn find_version(
        pool: &PgPool,
        promotion_id: &Uuid,
        country_iso: &str,
        version: i32,
    ) -> AppResult<Option<PromotionVersion>> {
        let row = sqlx::query_as::<_, PromotionVersion>(
            r#"
            SELECT * FROM promo.promotion_version
            WHERE promotion_id = $1 AND country_iso = $2 AND version = $3
            "#,
        )
        .bind(promotion_id)
        .bind(country_iso)
        .bind(version)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Flip a draft to published. Publishing is one-way; a version already
    /// published is left untouched.
    pub async fn publish_version(conn: &mut PgConnection, version_id: &Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE promo.promotion_version
            SET is_draft = FALSE
            WHERE id = $1 AND is_draft = TRUE
            "#,
        )
        .bind(version_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Published versions active in a country at time `t`, with their
    /// promotions. Ordered by promotion id for deterministic evaluation.
    pub async fn active_versions(
        pool: &PgPool,
        country_iso: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<(Promotion, PromotionVersion)>> {
        let versions = sqlx::query_as::<_, PromotionVersion>(
            r#"
            SELECT DISTINCT ON (promotion_id) *
            FROM promo.promotion_version
            WHERE country_iso = $1
              AND NOT is_draft
              AND (valid_from IS NULL OR valid_from <= $2)
              AND (valid_to IS NULL OR valid_to >= $2)
            ORDER BY promotion_id, version DESC
            "#,
        )
        .bind(country_iso)
        .bind(at)
        .fetch_all(pool)
        .await?;

        let mut result = Vec::with_capacity(versions.len());
        for version in versions {
            if let Some(promotion) = Self::find_by_id(pool, &version.promotion_id).await? {
                result.push((promotion, version));
            }
        }
        result.sort_by(|a, b| a.0.id.cmp(&b.0.id));

        Ok(result)
    }
}
