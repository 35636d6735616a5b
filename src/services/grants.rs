//! Reward grant service
//!
//! Converts a fired `(contact, promotion, tier, group, rewards)` into
//! persisted grant records, idempotently per source event, and computes the
//! cooldown horizon.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    constants::{outbox_types, DEFAULT_GRANT_UNIT},
    db::PromotionStore,
    error::AppResult,
    models::{ContactReward, MonetaryValue, NewGrant, NewOutboxMessage, Promotion, Reward},
    utils::time::cooldown_until,
};

/// Everything needed to persist the grants of one fired group.
#[derive(Debug)]
pub struct GrantRequest<'a> {
    pub contact_id: &'a str,
    pub promotion: &'a Promotion,
    pub version: i32,
    pub country_iso: &'a str,
    pub tier_level: i32,
    pub expression_group_id: Uuid,
    pub rewards: &'a [Reward],
    pub source_event_id: Option<&'a str>,
    pub granted_at: DateTime<Utc>,
    pub tier_cooldown_days: Option<i32>,
    pub global_cooldown_days: i32,
}

/// Grant persistence service.
pub struct GrantService {
    store: Arc<dyn PromotionStore>,
}

impl GrantService {
    pub fn new(store: Arc<dyn PromotionStore>) -> Self {
        Self { store }
    }

    /// Persist the grants for one fired group.
    ///
    /// Returns the written rows; an empty vec means the event was already
    /// granted and the call was a silent no-op. All grants and the outbox
    /// message land in one transaction.
    pub async fn grant(&self, request: GrantRequest<'_>) -> AppResult<Vec<ContactReward>> {
        if let Some(event_id) = request.source_event_id.filter(|e| !e.is_empty()) {
            let already = self
                .store
                .has_granted_for_event(request.contact_id, request.promotion.id, event_id)
                .await?;
            if already {
                tracing::debug!(
                    contact_id = request.contact_id,
                    promotion_id = %request.promotion.id,
                    event_id,
                    "Event already granted; skipping"
                );
                return Ok(Vec::new());
            }
        }

        let effective_days = request
            .tier_cooldown_days
            .unwrap_or(request.global_cooldown_days);
        let cooldown_until = cooldown_until(request.granted_at, effective_days);
        let source_event_id = request
            .source_event_id
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        // Placeholder value; the downstream consumer of the outbox event
        // computes the real amount.
        let placeholder = MonetaryValue::zero(DEFAULT_GRANT_UNIT);
        let base = NewGrant {
            contact_id: request.contact_id.to_string(),
            promotion_id: request.promotion.id,
            reward_id: None,
            expression_group_id: Some(request.expression_group_id),
            tier_level: request.tier_level,
            granted_at: request.granted_at,
            granted_amount: placeholder.amount,
            granted_unit: placeholder.unit,
            cooldown_until,
            source_event_id,
        };

        let grants: Vec<NewGrant> = if request.rewards.is_empty() {
            // A "calculated" placeholder grant with no concrete reward.
            vec![base]
        } else {
            request
                .rewards
                .iter()
                .map(|reward| NewGrant {
                    reward_id: Some(reward.id),
                    ..base.clone()
                })
                .collect()
        };

        let reward_ids: Vec<Uuid> = request.rewards.iter().map(|r| r.id).collect();
        let payload = serde_json::json!({
            "contactId": request.contact_id,
            "promotionId": request.promotion.id,
            "countryIso": request.country_iso,
            "version": request.version,
            "tierLevel": request.tier_level,
            "expressionGroupId": request.expression_group_id,
            "rewardIds": reward_ids,
            "grantedAt": request.granted_at,
            "sourceEventId": request.source_event_id,
        });
        let outbox = NewOutboxMessage::new(outbox_types::REWARDS_GRANTED, payload.to_string());

        let written = self.store.record_grants(&grants, Some(outbox)).await?;
        tracing::info!(
            contact_id = request.contact_id,
            promotion_id = %request.promotion.id,
            tier = request.tier_level,
            grants = written.len(),
            "Recorded grants"
        );
        Ok(written)
    }
}
