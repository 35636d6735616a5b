//! Publish service
//!
//! Flips the latest draft of `(promotion, country)` to published, writes the
//! outbox event in the same transaction, then warms the cache best-effort.
//! Publishing is one-way and re-publishing is a no-op.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    cache::PromotionCache,
    constants::outbox_types,
    db::repositories::{OutboxRepository, PromotionRepository},
    error::{AppError, AppResult},
    handlers::authoring::response::PublishResponse,
    models::NewOutboxMessage,
    utils::validation::validate_country_iso,
};

/// Publish service
pub struct PublishService;

impl PublishService {
    pub async fn publish(
        pool: &PgPool,
        cache: &dyn PromotionCache,
        promotion_id: Uuid,
        country_iso: &str,
    ) -> AppResult<PublishResponse> {
        let country = country_iso.trim().to_uppercase();
        validate_country_iso(&country).map_err(|e| AppError::Validation(e.to_string()))?;

        let promotion = PromotionRepository::find_by_id(pool, &promotion_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Promotion {} not found", promotion_id)))?;

        let version = PromotionRepository::latest_version(pool, &promotion_id, &country)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No version of promotion {} exists for {}",
                    promotion_id, country
                ))
            })?;

        if version.is_draft {
            let payload = serde_json::json!({
                "promotionId": promotion_id,
                "countryIso": country,
                "version": version.version,
            });

            let mut tx = pool.begin().await?;
            PromotionRepository::publish_version(&mut tx, &version.id).await?;
            OutboxRepository::insert(
                &mut tx,
                &NewOutboxMessage::new(outbox_types::PROMOTION_PUBLISHED, payload.to_string()),
            )
            .await?;
            tx.commit().await?;

            tracing::info!(
                promotion_id = %promotion_id,
                country = %country,
                version = version.version,
                "Published promotion version"
            );
        } else {
            tracing::debug!(
                promotion_id = %promotion_id,
                country = %country,
                version = version.version,
                "Version already published; publish is a no-op"
            );
        }

        // Warm failure never rolls the publish back; readers fall back to
        // the store until the next warm succeeds.
        if let Err(e) = cache
            .warm(
                &promotion,
                &country,
                version.version,
                &version.workflow_payload,
                &version.manifest_payload,
            )
            .await
        {
            tracing::warn!(
                promotion_id = %promotion_id,
                country = %country,
                "Cache warm after publish failed: {}",
                e
            );
        }

        Ok(PublishResponse {
            promotion_id,
            country_iso: country,
            version: version.version,
        })
    }
}
