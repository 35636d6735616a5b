//! Authoring service
//!
//! Draft upsert: validates the request against the domain invariants,
//! compiles the workflow, and persists the version with its tier/group tree
//! and reward links in one transaction.

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    constants::{MAX_GROUPS_PER_TIER, MAX_TIERS_PER_PROMOTION},
    db::repositories::{CatalogRepository, PromotionRepository, RewardRepository, TierRepository},
    error::{AppError, AppResult},
    handlers::authoring::{request::DraftUpsertRequest, response::DraftUpsertResponse},
    models::{
        validate_reward_kind, Manifest, ManifestPolicies, ManifestWindow, MonetaryValue, Reward,
        ValidityWindow,
    },
    services::compiler::PromotionCompiler,
    utils::validation::{
        validate_cooldown_days, validate_country_iso, validate_promotion_name, validate_tier_level,
    },
};

/// Authoring service for draft management
pub struct AuthoringService;

impl AuthoringService {
    /// Create or update a draft version.
    ///
    /// Allocates `MAX(version) + 1` for `(promotion, country)`; concurrent
    /// upserts racing on the same pair lose to the unique index and surface
    /// as a 409.
    pub async fn upsert_draft(
        pool: &PgPool,
        payload: DraftUpsertRequest,
    ) -> AppResult<DraftUpsertResponse> {
        let country = payload.country_iso.trim().to_uppercase();
        Self::validate(&payload, &country)?;

        // Every referenced reward must exist before anything is written.
        let mut reward_ids: Vec<Uuid> = payload.global_reward_ids.clone();
        for tier in &payload.tiers {
            for group in &tier.groups {
                reward_ids.extend(&group.reward_ids);
            }
        }
        reward_ids.sort();
        reward_ids.dedup();
        if !reward_ids.is_empty() {
            let found = RewardRepository::find_by_ids(pool, &reward_ids).await?;
            if found.len() != reward_ids.len() {
                return Err(AppError::Validation(
                    "request references unknown reward ids".to_string(),
                ));
            }
            Self::validate_rewards(&found)?;
        }

        let catalogs = CatalogRepository::load_catalogs(pool).await?;

        let mut tx = pool.begin().await?;

        let promotion = match payload.promotion_id {
            Some(id) => {
                PromotionRepository::find_by_id(pool, &id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Promotion {} not found", id)))?;
                PromotionRepository::update(
                    &mut tx,
                    &id,
                    payload.name.trim(),
                    &payload.timezone,
                    payload.policies.global_cooldown_days,
                )
                .await?
            }
            None => {
                PromotionRepository::create(
                    &mut tx,
                    payload.name.trim(),
                    &payload.timezone,
                    payload.policies.global_cooldown_days,
                )
                .await?
            }
        };

        let compiler = PromotionCompiler::new(&catalogs);
        let compiled = compiler.compile(promotion.id, &country, &payload.tiers);
        if compiled.workflow.rules.is_empty() {
            // Dropping the transaction rolls the promotion upsert back.
            return Err(AppError::Compile(format!(
                "workflow compiled to zero rules: {}",
                compiled.warnings.join("; ")
            )));
        }

        let manifest = Manifest {
            policies: ManifestPolicies {
                global_cooldown_days: payload.policies.global_cooldown_days,
                exclusive_per_event: payload.policies.exclusive_per_event,
                country: country.clone(),
            },
            window: ManifestWindow {
                valid_from_utc: payload.window.valid_from_utc,
                valid_to_utc: payload.window.valid_to_utc,
            },
            segments: payload.segments.clone(),
        };
        let workflow_payload = serde_json::to_string(&compiled.workflow)?;
        let manifest_payload = serde_json::to_string(&manifest)?;

        let version_number =
            PromotionRepository::next_version(&mut tx, &promotion.id, &country).await?;
        let version_row = PromotionRepository::insert_version(
            &mut tx,
            &promotion.id,
            version_number,
            &country,
            &workflow_payload,
            &manifest_payload,
            &payload.timezone,
            payload.policies.global_cooldown_days,
            payload.window.valid_from_utc,
            payload.window.valid_to_utc,
        )
        .await?;

        // The draft rewrites the promotion's tier/group tree.
        TierRepository::delete_for_promotion(&mut tx, &promotion.id).await?;
        for tier in &payload.tiers {
            let tier_row = TierRepository::insert_tier(
                &mut tx,
                &promotion.id,
                tier.tier_level,
                tier.order,
                tier.cooldown_days,
            )
            .await?;
            for group in &tier.groups {
                let expression_payload = serde_json::to_string(&group.expression)?;
                let group_row = TierRepository::insert_group(
                    &mut tx,
                    &promotion.id,
                    &tier_row.id,
                    group.order,
                    &expression_payload,
                )
                .await?;
                RewardRepository::link_group_rewards(&mut tx, &group_row.id, &group.reward_ids)
                    .await?;
            }
        }
        RewardRepository::replace_promotion_rewards(
            &mut tx,
            &promotion.id,
            &payload.global_reward_ids,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            promotion_id = %promotion.id,
            country = %country,
            version = version_row.version,
            warnings = compiled.warnings.len(),
            "Upserted draft"
        );

        Ok(DraftUpsertResponse {
            promotion_id: promotion.id,
            version: version_row.version,
            country_iso: country,
            workflow_name: compiled.workflow.workflow_name.clone(),
            warnings: compiled.warnings,
        })
    }

    /// A draft may only attach rewards whose catalog rows are coherent: a
    /// known kind and a well-formed monetary value.
    fn validate_rewards(rewards: &[Reward]) -> AppResult<()> {
        for reward in rewards {
            validate_reward_kind(&reward.kind).map_err(|e| {
                AppError::Validation(format!("reward {} ({}): {}", reward.id, reward.name, e))
            })?;
            MonetaryValue::new(reward.monetary_amount, &reward.monetary_unit).map_err(|e| {
                AppError::Validation(format!("reward {} ({}): {}", reward.id, reward.name, e))
            })?;
        }
        Ok(())
    }

    fn validate(payload: &DraftUpsertRequest, country: &str) -> AppResult<()> {
        validate_country_iso(country).map_err(|e| AppError::Validation(e.to_string()))?;
        validate_promotion_name(&payload.name).map_err(|e| AppError::Validation(e.to_string()))?;
        validate_cooldown_days(payload.policies.global_cooldown_days)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        ValidityWindow::new(payload.window.valid_from_utc, payload.window.valid_to_utc)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if payload.tiers.is_empty() {
            return Err(AppError::Validation(
                "a draft needs at least one tier".to_string(),
            ));
        }
        if payload.tiers.len() > MAX_TIERS_PER_PROMOTION {
            return Err(AppError::Validation(format!(
                "a draft may carry at most {} tiers",
                MAX_TIERS_PER_PROMOTION
            )));
        }

        let mut seen_levels = HashSet::new();
        for tier in &payload.tiers {
            if tier.groups.len() > MAX_GROUPS_PER_TIER {
                return Err(AppError::Validation(format!(
                    "tier {} carries more than {} groups",
                    tier.tier_level, MAX_GROUPS_PER_TIER
                )));
            }
            validate_tier_level(tier.tier_level)
                .map_err(|e| AppError::Validation(e.to_string()))?;
            if let Some(days) = tier.cooldown_days {
                validate_cooldown_days(days).map_err(|e| AppError::Validation(e.to_string()))?;
            }
            if !seen_levels.insert(tier.tier_level) {
                return Err(AppError::Conflict(format!(
                    "duplicate tier level {}",
                    tier.tier_level
                )));
            }
            let mut seen_orders = HashSet::new();
            for group in &tier.groups {
                if !seen_orders.insert(group.order) {
                    return Err(AppError::Conflict(format!(
                        "duplicate group order {} in tier {}",
                        group.order, tier.tier_level
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::authoring::request::{GroupDto, PoliciesDto, TierDto, WindowDto};

    fn request(tiers: Vec<TierDto>) -> DraftUpsertRequest {
        DraftUpsertRequest {
            promotion_id: None,
            name: "Summer Splash".to_string(),
            timezone: "UTC".to_string(),
            country_iso: "es".to_string(),
            policies: PoliciesDto {
                global_cooldown_days: 0,
                exclusive_per_event: true,
            },
            window: WindowDto::default(),
            segments: vec![],
            global_reward_ids: vec![],
            tiers,
        }
    }

    fn tier(level: i32, orders: &[i32]) -> TierDto {
        TierDto {
            tier_level: level,
            order: 0,
            cooldown_days: None,
            groups: orders
                .iter()
                .map(|o| GroupDto {
                    order: *o,
                    reward_ids: vec![],
                    expression: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_duplicate_tier_level_is_conflict() {
        let payload = request(vec![tier(1, &[0]), tier(1, &[0])]);
        let err = AuthoringService::validate(&payload, "ES").unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_duplicate_group_order_is_conflict() {
        let payload = request(vec![tier(1, &[0, 0])]);
        let err = AuthoringService::validate(&payload, "ES").unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_lowercase_country_is_normalized_before_validation() {
        let payload = request(vec![tier(1, &[0])]);
        assert!(AuthoringService::validate(&payload, "ES").is_ok());
        assert!(AuthoringService::validate(&payload, "esp").is_err());
    }

    #[test]
    fn test_empty_tiers_are_rejected() {
        let payload = request(vec![]);
        let err = AuthoringService::validate(&payload, "ES").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_incoherent_reward_rows_are_rejected() {
        let mut bad_kind = crate::test_utils::fixtures::reward("Mystery");
        bad_kind.kind = "stocks".to_string();
        let err = AuthoringService::validate_rewards(&[bad_kind]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut bad_value = crate::test_utils::fixtures::reward("Broken");
        bad_value.monetary_unit = "  ".to_string();
        let err = AuthoringService::validate_rewards(&[bad_value]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let good = crate::test_utils::fixtures::reward("Coupon");
        assert!(AuthoringService::validate_rewards(&[good]).is_ok());
    }
}
