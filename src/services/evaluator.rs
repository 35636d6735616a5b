//! Runtime evaluator
//!
//! Walks the active promotions of a country for one inbound event:
//! segment gate → event idempotency gate → tier walk under cooldown and
//! prerequisite constraints → rule execution → reward selection → grant.
//! At most one group fires per tier; an exclusive promotion stops the whole
//! walk once it awards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use plutus_rules::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    cache::PromotionCache,
    db::PromotionStore,
    error::AppResult,
    services::{
        grants::{GrantRequest, GrantService},
        provider::{ActivePromotion, PromotionProvider},
        segments::SegmentLookup,
    },
    utils::time::cooldown_elapsed,
};

/// One evaluation request.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub contact_id: String,
    pub country_iso: String,
    pub as_of_utc: DateTime<Utc>,
    /// Event fields the rules read, including the optional `eventId`.
    pub event_context: serde_json::Value,
}

impl EvaluationInput {
    fn event_id(&self) -> Option<&str> {
        self.event_context
            .get("eventId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// One awarded `(promotion, tier, group)`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub promotion_id: Uuid,
    pub version: i32,
    pub country_iso: String,
    pub awarded_tier: i32,
    pub expression_group_id: Uuid,
    pub reward_ids: Vec<Uuid>,
}

/// The promotion evaluation state machine.
pub struct PromotionEvaluator {
    provider: Arc<PromotionProvider>,
    store: Arc<dyn PromotionStore>,
    cache: Arc<dyn PromotionCache>,
    segments: Arc<dyn SegmentLookup>,
    engine: Arc<WorkflowEngine>,
    grants: Arc<GrantService>,
}

impl PromotionEvaluator {
    pub fn new(
        provider: Arc<PromotionProvider>,
        store: Arc<dyn PromotionStore>,
        cache: Arc<dyn PromotionCache>,
        segments: Arc<dyn SegmentLookup>,
        engine: Arc<WorkflowEngine>,
        grants: Arc<GrantService>,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            segments,
            engine,
            grants,
        }
    }

    /// Evaluate one event for one contact in one country.
    ///
    /// A store or cache failure on one promotion skips that promotion and
    /// the rest continue; the response carries whatever was awarded.
    pub async fn evaluate(&self, input: &EvaluationInput) -> AppResult<Vec<EvaluationOutcome>> {
        let country = input.country_iso.to_uppercase();

        let active = self
            .provider
            .active_promotions(&country, input.as_of_utc)
            .await?;

        let contact_segments = match self
            .segments
            .segments_for_contact(&input.contact_id, &country)
            .await
        {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(
                    contact_id = %input.contact_id,
                    "Segment lookup failed, treating contact as unsegmented: {}",
                    e
                );
                Vec::new()
            }
        };

        let ctx = context_from_json(&input.event_context);

        let mut results = Vec::new();
        for promotion in &active {
            match self
                .evaluate_promotion(promotion, input, &contact_segments, &ctx)
                .await
            {
                Ok((fired, stop)) => {
                    results.extend(fired);
                    if stop {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        promotion_id = %promotion.promotion.id,
                        "Skipping promotion after error: {}",
                        e
                    );
                }
            }
        }

        Ok(results)
    }

    /// Evaluate one promotion. Returns the outcomes awarded plus whether the
    /// outer promotion loop must stop (exclusive promotion fired).
    async fn evaluate_promotion(
        &self,
        promotion: &ActivePromotion,
        input: &EvaluationInput,
        contact_segments: &[String],
        ctx: &EvalContext,
    ) -> AppResult<(Vec<EvaluationOutcome>, bool)> {
        // Segment gate. An unparseable manifest fails open.
        if let Some(manifest) = &promotion.manifest {
            if !manifest.segments_match(contact_segments) {
                return Ok((Vec::new(), false));
            }
        }

        // Event idempotency gate.
        if let Some(event_id) = input.event_id() {
            if self
                .store
                .has_granted_for_event(&input.contact_id, promotion.promotion.id, event_id)
                .await?
            {
                return Ok((Vec::new(), false));
            }
        }

        // Tier-1 cooldown against the last granted reward of any tier.
        let global_days = promotion.global_cooldown_days();
        let can_tier_1 = match self
            .store
            .last_granted(&input.contact_id, promotion.promotion.id)
            .await?
        {
            Some(last) => cooldown_elapsed(last.granted_at, global_days, input.as_of_utc),
            None => true,
        };

        let exclusive = promotion.exclusive_per_event();

        let tiers = self
            .store
            .tiers_for_promotion(promotion.promotion.id)
            .await?;

        let mut fired = Vec::new();
        for tier in &tiers {
            if tier.tier_level == 1 && !can_tier_1 {
                continue;
            }
            if tier.tier_level > 1 {
                // The prior tier must have been earned, and the tier's own
                // cooldown measured from that grant must have elapsed.
                let prev = match self
                    .store
                    .last_granted_for_tier(
                        &input.contact_id,
                        promotion.promotion.id,
                        tier.tier_level - 1,
                    )
                    .await?
                {
                    Some(prev) => prev,
                    None => continue,
                };
                if let Some(days) = tier.cooldown_days {
                    if !cooldown_elapsed(prev.granted_at, days, input.as_of_utc) {
                        continue;
                    }
                }
            }

            let groups = self.store.groups_for_tier(tier.id).await?;
            let before = fired.len();
            for group in &groups {
                let rule_name = tier.rule_name(group.sort_order);
                let matched = match self
                    .engine
                    .evaluate(&promotion.workflow, &rule_name, ctx)
                    .await
                {
                    Ok(matched) => matched,
                    Err(e) => {
                        tracing::warn!(
                            rule = %rule_name,
                            promotion_id = %promotion.promotion.id,
                            "Rule evaluation failed, treating as non-matching: {}",
                            e
                        );
                        false
                    }
                };
                if !matched {
                    continue;
                }

                // Group rewards override the global pool when non-empty.
                let mut rewards = self.store.group_rewards(group.id).await?;
                if rewards.is_empty() {
                    rewards = self.store.global_rewards(promotion.promotion.id).await?;
                }

                self.grants
                    .grant(GrantRequest {
                        contact_id: &input.contact_id,
                        promotion: &promotion.promotion,
                        version: promotion.version,
                        country_iso: &promotion.country_iso,
                        tier_level: tier.tier_level,
                        expression_group_id: group.id,
                        rewards: &rewards,
                        source_event_id: input.event_id(),
                        granted_at: input.as_of_utc,
                        tier_cooldown_days: tier.cooldown_days,
                        global_cooldown_days: global_days,
                    })
                    .await?;

                fired.push(EvaluationOutcome {
                    promotion_id: promotion.promotion.id,
                    version: promotion.version,
                    country_iso: promotion.country_iso.clone(),
                    awarded_tier: tier.tier_level,
                    expression_group_id: group.id,
                    reward_ids: rewards.iter().map(|r| r.id).collect(),
                });

                // Keep the hot keys fresh for the next event.
                if let Err(e) = self
                    .cache
                    .warm(
                        &promotion.promotion,
                        &promotion.country_iso,
                        promotion.version,
                        &promotion.workflow_payload,
                        &promotion.manifest_payload,
                    )
                    .await
                {
                    tracing::warn!(
                        promotion_id = %promotion.promotion.id,
                        "Post-award cache warm failed: {}",
                        e
                    );
                }

                // At most one group fires per tier.
                break;
            }

            if fired.len() > before && exclusive {
                return Ok((fired, true));
            }
        }

        Ok((fired, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::grant_statuses;
    use crate::test_utils::{fixtures, InMemoryCache, InMemoryStore, StaticSegments};
    use serde_json::json;
    use std::time::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn evaluator(
        store: Arc<InMemoryStore>,
        cache: Arc<InMemoryCache>,
        segments: Arc<StaticSegments>,
    ) -> PromotionEvaluator {
        let provider = Arc::new(PromotionProvider::new(store.clone(), cache.clone()));
        let engine = Arc::new(WorkflowEngine::new(64, Duration::from_millis(250)));
        let grants = Arc::new(GrantService::new(store.clone()));
        PromotionEvaluator::new(provider, store, cache, segments, engine, grants)
    }

    fn input(contact: &str, event: &str, gasto: i64, as_of: &str) -> EvaluationInput {
        EvaluationInput {
            contact_id: contact.to_string(),
            country_iso: "ES".to_string(),
            as_of_utc: at(as_of),
            event_context: json!({
                "gasto": gasto,
                "club": "",
                "esVip": false,
                "eventId": event,
            }),
        }
    }

    /// Scenario 1: simple tier-1 grant, no cooldown.
    #[tokio::test]
    async fn test_simple_tier_1_grant() {
        let store = Arc::new(InMemoryStore::new());
        let seeded = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(1, None, &["ctx.gasto > 50"]),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].promotion_id, seeded.promotion.id);
        assert_eq!(results[0].version, 1);
        assert_eq!(results[0].country_iso, "ES");
        assert_eq!(results[0].awarded_tier, 1);
        assert_eq!(results[0].expression_group_id, seeded.group_ids[0]);

        let grants = store.grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].status, grant_statuses::PENDING);
        assert_eq!(grants[0].cooldown_until, None);
        assert_eq!(grants[0].source_event_id.as_deref(), Some("e1"));
    }

    /// Scenario 1 with a non-matching event: nothing fires.
    #[tokio::test]
    async fn test_non_matching_event_awards_nothing() {
        let store = Arc::new(InMemoryStore::new());
        fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(1, None, &["ctx.gasto > 50"]),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 40, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert!(results.is_empty());
        assert!(store.grants().is_empty());
    }

    /// Scenario 2: event idempotency.
    #[tokio::test]
    async fn test_event_idempotency_gate() {
        let store = Arc::new(InMemoryStore::new());
        fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(1, None, &["ctx.gasto > 50"]),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let first = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        let grant_id = store.grants()[0].id;
        store.set_grant_status(&grant_id, grant_statuses::GRANTED);

        let second = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-02T00:00:00Z"))
            .await
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(store.grants().len(), 1);
    }

    /// Scenario 3: tier-1 cooldown blocks re-fire until it elapses.
    #[tokio::test]
    async fn test_tier_1_cooldown() {
        let store = Arc::new(InMemoryStore::new());
        let seeded = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES")
                .global_cooldown(7)
                .tier(1, None, &["ctx.gasto > 50"]),
        );
        store.insert_granted(
            "C",
            seeded.promotion.id,
            1,
            at("2024-01-01T00:00:00Z"),
            Some("e0"),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let blocked = evaluator
            .evaluate(&input("C", "e2", 60, "2024-01-05T00:00:00Z"))
            .await
            .unwrap();
        assert!(blocked.is_empty());

        let fired = evaluator
            .evaluate(&input("C", "e3", 60, "2024-01-08T00:00:01Z"))
            .await
            .unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].awarded_tier, 1);
    }

    /// Scenario 4: tier 2 needs a prior tier-1 grant and its own cooldown.
    #[tokio::test]
    async fn test_tier_2_prerequisite_and_cooldown() {
        let store = Arc::new(InMemoryStore::new());
        fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES")
                .global_cooldown(7)
                .tier(1, None, &["ctx.gasto > 50"])
                .tier(2, Some(3), &["ctx.gasto > 50"]),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        // No tier-1 grant yet: only tier 1 fires.
        let first = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].awarded_tier, 1);

        let grant_id = store.grants()[0].id;
        store.set_grant_status(&grant_id, grant_statuses::GRANTED);

        // Two days later tier 1 is cooling down and tier 2's own cooldown
        // has not elapsed either.
        let blocked = evaluator
            .evaluate(&input("C", "e2", 60, "2024-01-03T00:00:00Z"))
            .await
            .unwrap();
        assert!(blocked.is_empty());

        // Four days later tier 1 is still cooling down but tier 2 unlocks.
        let second = evaluator
            .evaluate(&input("C", "e3", 60, "2024-01-05T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].awarded_tier, 2);
    }

    /// Scenario 5: exclusive-per-event stops at the first promotion that fires.
    #[tokio::test]
    async fn test_exclusive_per_event_across_promotions() {
        let store = Arc::new(InMemoryStore::new());
        let a = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(1, None, &["ctx.gasto > 50"]),
        );
        let b = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P2", "ES").tier(1, None, &["ctx.gasto > 50"]),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        // Provider order is promotion-id order; only the first fires.
        let first_id = a.promotion.id.min(b.promotion.id);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].promotion_id, first_id);
        assert_eq!(store.grants().len(), 1);
    }

    /// Both fire when exclusivity is off.
    #[tokio::test]
    async fn test_non_exclusive_promotions_all_fire() {
        let store = Arc::new(InMemoryStore::new());
        fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES")
                .exclusive(false)
                .tier(1, None, &["ctx.gasto > 50"]),
        );
        fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P2", "ES")
                .exclusive(false)
                .tier(1, None, &["ctx.gasto > 50"]),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(store.grants().len(), 2);
    }

    /// Scenario 6: segment gate.
    #[tokio::test]
    async fn test_segment_gate() {
        let store = Arc::new(InMemoryStore::new());
        fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES")
                .segments(&["vip"])
                .tier(1, None, &["ctx.gasto > 50"]),
        );
        let cache = Arc::new(InMemoryCache::new());

        let gated = evaluator(
            store.clone(),
            cache.clone(),
            Arc::new(StaticSegments::with("C", &["regular"])),
        );
        let blocked = gated
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert!(blocked.is_empty());

        let admitted = evaluator(
            store.clone(),
            cache,
            Arc::new(StaticSegments::with("C", &["vip", "regular"])),
        );
        let fired = admitted
            .evaluate(&input("C", "e2", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(fired.len(), 1);
    }

    /// At most one group fires per tier, in ascending order.
    #[tokio::test]
    async fn test_first_matching_group_wins() {
        let store = Arc::new(InMemoryStore::new());
        let seeded = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(
                1,
                None,
                &["ctx.gasto > 100", "ctx.gasto > 50", "ctx.gasto > 10"],
            ),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        // Group 0 misses, group 1 fires, group 2 never runs.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].expression_group_id, seeded.group_ids[1]);
        assert_eq!(store.grants().len(), 1);
    }

    /// A rule that errors (type mismatch) counts as non-matching.
    #[tokio::test]
    async fn test_rule_error_treated_as_false() {
        let store = Arc::new(InMemoryStore::new());
        let seeded = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(
                1,
                None,
                &["ctx.missing_field > 1", "ctx.gasto > 50"],
            ),
        );
        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].expression_group_id, seeded.group_ids[1]);
    }

    /// Group rewards override the global pool; empty group falls back.
    #[tokio::test]
    async fn test_reward_selection() {
        let store = Arc::new(InMemoryStore::new());
        let global = fixtures::reward("Global");
        let specific = fixtures::reward("Specific");
        let seeded = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES")
                .exclusive(false)
                .global_rewards(&[global.clone()])
                .tier(1, None, &["ctx.gasto > 50", "ctx.gasto > 500"]),
        );
        store.link_group_reward(seeded.group_ids[0], &specific);

        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].reward_ids, vec![specific.id]);

        // Second tier-less promotion path: a group with no linked rewards
        // falls back to the global pool.
        let fallback = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P2", "ES")
                .exclusive(false)
                .global_rewards(&[global.clone()])
                .tier(1, None, &["ctx.gasto > 50"]),
        );
        let results = evaluator
            .evaluate(&input("C", "e2", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        let from_fallback = results
            .iter()
            .find(|r| r.promotion_id == fallback.promotion.id)
            .unwrap();
        assert_eq!(from_fallback.reward_ids, vec![global.id]);
    }

    /// A workflow whose store tiers are missing yields no result.
    #[tokio::test]
    async fn test_missing_tiers_yield_no_result() {
        let store = Arc::new(InMemoryStore::new());
        let seeded = fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(1, None, &["ctx.gasto > 50"]),
        );
        store.clear_tiers(seeded.promotion.id);

        let evaluator = evaluator(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(StaticSegments::default()),
        );

        let results = evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    /// The awarded promotion is re-warmed into the cache.
    #[tokio::test]
    async fn test_award_warms_cache() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        fixtures::seed_promotion(
            &store,
            fixtures::SeedPromo::new("P1", "ES").tier(1, None, &["ctx.gasto > 50"]),
        );
        let evaluator = evaluator(
            store.clone(),
            cache.clone(),
            Arc::new(StaticSegments::default()),
        );

        evaluator
            .evaluate(&input("C", "e1", 60, "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(cache.warm_calls(), 1);
    }
}
