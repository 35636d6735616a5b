//! Shared test utilities: catalog fixtures, in-memory fakes for the store,
//! cache and segment lookup, and promotion seeding helpers.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    cache::{keys, PromotionCache},
    constants::{grant_statuses, reward_kinds, DEFAULT_GRANT_UNIT},
    db::PromotionStore,
    error::{AppError, AppResult},
    models::{
        ContactReward, Manifest, ManifestPolicies, ManifestWindow, NewGrant, NewOutboxMessage,
        Promotion, PromotionVersion, RuleExpressionGroup, RuleTier, Reward,
    },
    services::segments::SegmentLookup,
};

// =============================================================================
// Catalog fixture
// =============================================================================

pub mod catalog_fixture {
    use std::collections::HashSet;

    use uuid::Uuid;

    use crate::constants::{data_types, operators};
    use crate::models::{AttributeCatalog, Catalogs, OperatorCatalog};

    /// A small but representative catalog pair: event attributes of every
    /// compilable type plus the full operator set. The support matrix leaves
    /// a few combinations undeclared on purpose so warning paths are
    /// exercisable.
    pub fn catalogs() -> Catalogs {
        let mut catalogs = Catalogs::default();

        let attributes = [
            ("gasto", data_types::NUMBER),
            ("club", data_types::STRING),
            ("esVip", data_types::BOOL),
            ("tags", data_types::STRING_ARRAY),
            ("since", data_types::DATE),
            ("eventId", data_types::GUID),
        ];
        for (name, data_type) in attributes {
            let attr = AttributeCatalog {
                id: Uuid::new_v4(),
                entity_logical_name: "event".to_string(),
                attribute_logical_name: name.to_lowercase(),
                display_name: name.to_string(),
                data_type: data_type.to_string(),
                is_exposed: true,
            };
            catalogs.attributes.insert(attr.id, attr);
        }

        let operator_support: [(&str, &[&str]); 8] = [
            (operators::GT, &[data_types::NUMBER, data_types::DATE]),
            (operators::GTE, &[data_types::NUMBER, data_types::DATE]),
            (operators::LT, &[data_types::NUMBER, data_types::DATE]),
            (operators::LTE, &[data_types::NUMBER, data_types::DATE]),
            (
                operators::EQ,
                &[
                    data_types::NUMBER,
                    data_types::STRING,
                    data_types::BOOL,
                    data_types::DATE,
                ],
            ),
            (operators::NEQ, &[data_types::NUMBER, data_types::DATE]),
            (operators::CONTAINS, &[data_types::STRING]),
            (operators::IN, &[data_types::STRING_ARRAY]),
        ];
        for (code, supported) in operator_support {
            let op = OperatorCatalog {
                id: Uuid::new_v4(),
                code: code.to_string(),
                display_name: code.to_uppercase(),
                is_active: true,
            };
            let types: HashSet<String> = supported.iter().map(|t| t.to_string()).collect();
            catalogs.supported_types.insert(op.id, types);
            catalogs.operators.insert(op.id, op);
        }

        catalogs
    }

    pub fn attribute_id(catalogs: &Catalogs, display_name: &str) -> Uuid {
        catalogs
            .attributes
            .values()
            .find(|a| a.display_name == display_name)
            .map(|a| a.id)
            .unwrap_or_else(|| panic!("no fixture attribute '{}'", display_name))
    }

    pub fn operator_id(catalogs: &Catalogs, code: &str) -> Uuid {
        catalogs
            .operators
            .values()
            .find(|o| o.code == code)
            .map(|o| o.id)
            .unwrap_or_else(|| panic!("no fixture operator '{}'", code))
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct StoreInner {
    promotions: Vec<Promotion>,
    versions: Vec<PromotionVersion>,
    tiers: Vec<RuleTier>,
    groups: Vec<RuleExpressionGroup>,
    rewards: Vec<Reward>,
    promotion_rewards: Vec<(Uuid, Uuid)>,
    group_rewards: Vec<(Uuid, Uuid)>,
    grants: Vec<ContactReward>,
    outbox: Vec<NewOutboxMessage>,
}

/// In-memory [`PromotionStore`] fake.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_promotion(&self, promotion: Promotion) {
        self.inner.lock().unwrap().promotions.push(promotion);
    }

    pub fn insert_version(&self, version: PromotionVersion) {
        self.inner.lock().unwrap().versions.push(version);
    }

    pub fn insert_tier(&self, tier: RuleTier) {
        self.inner.lock().unwrap().tiers.push(tier);
    }

    pub fn insert_group(&self, group: RuleExpressionGroup) {
        self.inner.lock().unwrap().groups.push(group);
    }

    pub fn insert_reward(&self, reward: Reward) {
        self.inner.lock().unwrap().rewards.push(reward);
    }

    pub fn link_promotion_reward(&self, promotion_id: Uuid, reward: &Reward) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.rewards.iter().any(|r| r.id == reward.id) {
            inner.rewards.push(reward.clone());
        }
        inner.promotion_rewards.push((promotion_id, reward.id));
    }

    pub fn link_group_reward(&self, group_id: Uuid, reward: &Reward) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.rewards.iter().any(|r| r.id == reward.id) {
            inner.rewards.push(reward.clone());
        }
        inner.group_rewards.push((group_id, reward.id));
    }

    /// Insert an already-granted reward, simulating a grant confirmed by the
    /// downstream system.
    pub fn insert_granted(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
        tier_level: i32,
        granted_at: DateTime<Utc>,
        source_event_id: Option<&str>,
    ) {
        self.inner.lock().unwrap().grants.push(ContactReward {
            id: Uuid::new_v4(),
            contact_id: contact_id.to_string(),
            promotion_id,
            reward_id: None,
            expression_group_id: None,
            tier_level,
            granted_at,
            status: grant_statuses::GRANTED.to_string(),
            granted_amount: 0.0,
            granted_unit: DEFAULT_GRANT_UNIT.to_string(),
            cooldown_until: None,
            source_event_id: source_event_id.map(str::to_string),
        });
    }

    pub fn set_grant_status(&self, id: &Uuid, status: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(grant) = inner.grants.iter_mut().find(|g| g.id == *id) {
            grant.status = status.to_string();
        }
    }

    pub fn clear_tiers(&self, promotion_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.tiers.retain(|t| t.promotion_id != promotion_id);
        inner.groups.retain(|g| g.promotion_id != promotion_id);
    }

    pub fn grants(&self) -> Vec<ContactReward> {
        self.inner.lock().unwrap().grants.clone()
    }

    pub fn outbox_messages(&self) -> Vec<NewOutboxMessage> {
        self.inner.lock().unwrap().outbox.clone()
    }
}

#[async_trait]
impl PromotionStore for InMemoryStore {
    async fn active_versions(
        &self,
        country_iso: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<(Promotion, PromotionVersion)>> {
        let inner = self.inner.lock().unwrap();
        let country = country_iso.to_uppercase();

        let mut latest: HashMap<Uuid, PromotionVersion> = HashMap::new();
        for version in &inner.versions {
            if version.country_iso != country || version.is_draft || !version.active_at(at) {
                continue;
            }
            let entry = latest.entry(version.promotion_id);
            match entry {
                std::collections::hash_map::Entry::Occupied(mut existing) => {
                    if version.version > existing.get().version {
                        existing.insert(version.clone());
                    }
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(version.clone());
                }
            }
        }

        let mut result = Vec::new();
        for (promotion_id, version) in latest {
            if let Some(promotion) = inner.promotions.iter().find(|p| p.id == promotion_id) {
                result.push((promotion.clone(), version));
            }
        }
        result.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        Ok(result)
    }

    async fn find_promotion(&self, id: Uuid) -> AppResult<Option<Promotion>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.promotions.iter().find(|p| p.id == id).cloned())
    }

    async fn tiers_for_promotion(&self, promotion_id: Uuid) -> AppResult<Vec<RuleTier>> {
        let inner = self.inner.lock().unwrap();
        let mut tiers: Vec<RuleTier> = inner
            .tiers
            .iter()
            .filter(|t| t.promotion_id == promotion_id)
            .cloned()
            .collect();
        tiers.sort_by_key(|t| (t.tier_level, t.sort_order));
        Ok(tiers)
    }

    async fn groups_for_tier(&self, tier_id: Uuid) -> AppResult<Vec<RuleExpressionGroup>> {
        let inner = self.inner.lock().unwrap();
        let mut groups: Vec<RuleExpressionGroup> = inner
            .groups
            .iter()
            .filter(|g| g.tier_id == tier_id)
            .cloned()
            .collect();
        groups.sort_by_key(|g| g.sort_order);
        Ok(groups)
    }

    async fn global_rewards(&self, promotion_id: Uuid) -> AppResult<Vec<Reward>> {
        let inner = self.inner.lock().unwrap();
        let rewards = inner
            .promotion_rewards
            .iter()
            .filter(|(p, _)| *p == promotion_id)
            .filter_map(|(_, r)| inner.rewards.iter().find(|reward| reward.id == *r))
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        Ok(rewards)
    }

    async fn group_rewards(&self, group_id: Uuid) -> AppResult<Vec<Reward>> {
        let inner = self.inner.lock().unwrap();
        let rewards = inner
            .group_rewards
            .iter()
            .filter(|(g, _)| *g == group_id)
            .filter_map(|(_, r)| inner.rewards.iter().find(|reward| reward.id == *r))
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        Ok(rewards)
    }

    async fn last_granted(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
    ) -> AppResult<Option<ContactReward>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .grants
            .iter()
            .filter(|g| {
                g.contact_id == contact_id
                    && g.promotion_id == promotion_id
                    && g.status == grant_statuses::GRANTED
            })
            .max_by_key(|g| g.granted_at)
            .cloned())
    }

    async fn last_granted_for_tier(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
        tier_level: i32,
    ) -> AppResult<Option<ContactReward>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .grants
            .iter()
            .filter(|g| {
                g.contact_id == contact_id
                    && g.promotion_id == promotion_id
                    && g.tier_level == tier_level
                    && g.status == grant_statuses::GRANTED
            })
            .max_by_key(|g| g.granted_at)
            .cloned())
    }

    async fn has_granted_for_event(
        &self,
        contact_id: &str,
        promotion_id: Uuid,
        source_event_id: &str,
    ) -> AppResult<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.grants.iter().any(|g| {
            g.contact_id == contact_id
                && g.promotion_id == promotion_id
                && g.source_event_id.as_deref() == Some(source_event_id)
                && g.status == grant_statuses::GRANTED
        }))
    }

    async fn record_grants(
        &self,
        grants: &[NewGrant],
        outbox: Option<NewOutboxMessage>,
    ) -> AppResult<Vec<ContactReward>> {
        let mut inner = self.inner.lock().unwrap();
        let mut written = Vec::with_capacity(grants.len());
        for grant in grants {
            let row = ContactReward {
                id: Uuid::new_v4(),
                contact_id: grant.contact_id.clone(),
                promotion_id: grant.promotion_id,
                reward_id: grant.reward_id,
                expression_group_id: grant.expression_group_id,
                tier_level: grant.tier_level,
                granted_at: grant.granted_at,
                status: grant_statuses::PENDING.to_string(),
                granted_amount: grant.granted_amount,
                granted_unit: grant.granted_unit.clone(),
                cooldown_until: grant.cooldown_until,
                source_event_id: grant.source_event_id.clone(),
            };
            inner.grants.push(row.clone());
            written.push(row);
        }
        if let Some(message) = outbox {
            inner.outbox.push(message);
        }
        Ok(written)
    }
}

// =============================================================================
// In-memory cache
// =============================================================================

#[derive(Default)]
struct CacheInner {
    workflows: HashMap<String, String>,
    manifests: HashMap<String, String>,
    index: HashMap<String, HashMap<Uuid, i32>>,
    active: HashMap<String, BTreeSet<Uuid>>,
    warm_calls: usize,
    fail: bool,
}

/// In-memory [`PromotionCache`] fake mirroring the Redis key semantics.
#[derive(Default)]
pub struct InMemoryCache {
    inner: Mutex<CacheInner>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every cache call fail, to exercise store fallback.
    pub fn set_fail(&self, fail: bool) {
        self.inner.lock().unwrap().fail = fail;
    }

    pub fn warm_calls(&self) -> usize {
        self.inner.lock().unwrap().warm_calls
    }

    fn check(&self) -> AppResult<()> {
        if self.inner.lock().unwrap().fail {
            Err(AppError::Cache("injected cache failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PromotionCache for InMemoryCache {
    async fn warm(
        &self,
        promotion: &Promotion,
        country_iso: &str,
        version: i32,
        workflow_payload: &str,
        manifest_payload: &str,
    ) -> AppResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let country = country_iso.to_uppercase();
        inner.workflows.insert(
            keys::workflow_key(&country, promotion.id, version),
            workflow_payload.to_string(),
        );
        inner.manifests.insert(
            keys::manifest_key(&country, promotion.id, version),
            manifest_payload.to_string(),
        );
        inner
            .index
            .entry(country.clone())
            .or_default()
            .insert(promotion.id, version);
        inner.active.entry(country).or_default().insert(promotion.id);
        inner.warm_calls += 1;
        Ok(())
    }

    async fn active_promotions(&self, country_iso: &str) -> AppResult<Vec<Uuid>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .active
            .get(&country_iso.to_uppercase())
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn latest_version(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
    ) -> AppResult<Option<i32>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .index
            .get(&country_iso.to_uppercase())
            .and_then(|m| m.get(&promotion_id))
            .copied())
    }

    async fn get_workflow(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
        version: Option<i32>,
    ) -> AppResult<Option<String>> {
        self.check()?;
        let version = match version {
            Some(v) => v,
            None => match self.latest_version(country_iso, promotion_id).await? {
                Some(v) => v,
                None => return Ok(None),
            },
        };
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .workflows
            .get(&keys::workflow_key(country_iso, promotion_id, version))
            .cloned())
    }

    async fn get_manifest(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
        version: i32,
    ) -> AppResult<Option<String>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .manifests
            .get(&keys::manifest_key(country_iso, promotion_id, version))
            .cloned())
    }

    async fn invalidate(&self, country_iso: &str, promotion_id: Uuid) -> AppResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let country = country_iso.to_uppercase();
        let current = inner
            .index
            .get(&country)
            .and_then(|m| m.get(&promotion_id))
            .copied();
        if let Some(version) = current {
            inner
                .workflows
                .remove(&keys::workflow_key(&country, promotion_id, version));
            inner
                .manifests
                .remove(&keys::manifest_key(&country, promotion_id, version));
        }
        if let Some(index) = inner.index.get_mut(&country) {
            index.remove(&promotion_id);
        }
        if let Some(active) = inner.active.get_mut(&country) {
            active.remove(&promotion_id);
        }
        Ok(())
    }
}

// =============================================================================
// Static segment lookup
// =============================================================================

/// [`SegmentLookup`] fake with a fixed contact→segments map.
#[derive(Default)]
pub struct StaticSegments {
    map: HashMap<String, Vec<String>>,
}

impl StaticSegments {
    pub fn with(contact_id: &str, segments: &[&str]) -> Self {
        let mut map = HashMap::new();
        map.insert(
            contact_id.to_string(),
            segments.iter().map(|s| s.to_string()).collect(),
        );
        Self { map }
    }
}

#[async_trait]
impl SegmentLookup for StaticSegments {
    async fn segments_for_contact(
        &self,
        contact_id: &str,
        _country_iso: &str,
    ) -> AppResult<Vec<String>> {
        Ok(self.map.get(contact_id).cloned().unwrap_or_default())
    }
}

// =============================================================================
// Seeding helpers
// =============================================================================

pub mod fixtures {
    use chrono::Utc;
    use plutus_rules::workflow::{Workflow, WorkflowRule};
    use uuid::Uuid;

    use super::*;

    pub fn promotion(name: &str, global_cooldown_days: i32) -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            name: name.to_string(),
            timezone: "UTC".to_string(),
            global_cooldown_days,
            created_at: Utc::now(),
        }
    }

    pub fn reward(name: &str) -> Reward {
        Reward {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: reward_kinds::COUPON.to_string(),
            monetary_amount: 10.0,
            monetary_unit: DEFAULT_GRANT_UNIT.to_string(),
            is_active: true,
        }
    }

    /// Declarative seed for one published promotion.
    pub struct SeedPromo {
        name: String,
        country: String,
        global_cooldown_days: i32,
        exclusive: bool,
        segments: Vec<String>,
        global_rewards: Vec<Reward>,
        /// (tier_level, tier_cooldown_days, group expressions in order)
        tiers: Vec<(i32, Option<i32>, Vec<String>)>,
    }

    impl SeedPromo {
        pub fn new(name: &str, country: &str) -> Self {
            Self {
                name: name.to_string(),
                country: country.to_uppercase(),
                global_cooldown_days: 0,
                exclusive: true,
                segments: Vec::new(),
                global_rewards: Vec::new(),
                tiers: Vec::new(),
            }
        }

        pub fn global_cooldown(mut self, days: i32) -> Self {
            self.global_cooldown_days = days;
            self
        }

        pub fn exclusive(mut self, exclusive: bool) -> Self {
            self.exclusive = exclusive;
            self
        }

        pub fn segments(mut self, segments: &[&str]) -> Self {
            self.segments = segments.iter().map(|s| s.to_string()).collect();
            self
        }

        pub fn global_rewards(mut self, rewards: &[Reward]) -> Self {
            self.global_rewards = rewards.to_vec();
            self
        }

        pub fn tier(mut self, level: i32, cooldown_days: Option<i32>, groups: &[&str]) -> Self {
            self.tiers.push((
                level,
                cooldown_days,
                groups.iter().map(|g| g.to_string()).collect(),
            ));
            self
        }
    }

    /// What a seed produced, for assertions.
    pub struct Seeded {
        pub promotion: Promotion,
        pub version: PromotionVersion,
        /// Group ids in (tier, group) seed order.
        pub group_ids: Vec<Uuid>,
    }

    /// Publish a promotion straight into the fake store: version 1, compiled
    /// workflow assembled from the given group expressions, manifest built
    /// from the seed's policies.
    pub fn seed_promotion(store: &InMemoryStore, seed: SeedPromo) -> Seeded {
        let promo = promotion(&seed.name, seed.global_cooldown_days);

        let mut rules = Vec::new();
        for (level, _, groups) in &seed.tiers {
            for (order, expression) in groups.iter().enumerate() {
                rules.push(WorkflowRule::new(
                    format!("tier:{}:group:{}", level, order),
                    format!("{}:{}", level, order),
                    expression.clone(),
                ));
            }
        }
        let workflow = Workflow::new(
            format!("promo:{}:country:{}", promo.id, seed.country),
            rules,
        );

        let manifest = Manifest {
            policies: ManifestPolicies {
                global_cooldown_days: seed.global_cooldown_days,
                exclusive_per_event: seed.exclusive,
                country: seed.country.clone(),
            },
            window: ManifestWindow::default(),
            segments: seed.segments.clone(),
        };

        let version = PromotionVersion {
            id: Uuid::new_v4(),
            promotion_id: promo.id,
            version: 1,
            country_iso: seed.country.clone(),
            is_draft: false,
            workflow_payload: serde_json::to_string(&workflow).unwrap(),
            manifest_payload: serde_json::to_string(&manifest).unwrap(),
            timezone: promo.timezone.clone(),
            global_cooldown_days: seed.global_cooldown_days,
            valid_from: None,
            valid_to: None,
            created_at: Utc::now(),
        };

        store.insert_promotion(promo.clone());
        store.insert_version(version.clone());

        let mut group_ids = Vec::new();
        for (level, cooldown_days, groups) in &seed.tiers {
            let tier = RuleTier {
                id: Uuid::new_v4(),
                promotion_id: promo.id,
                tier_level: *level,
                sort_order: 0,
                cooldown_days: *cooldown_days,
            };
            store.insert_tier(tier.clone());
            for (order, expression) in groups.iter().enumerate() {
                let group = RuleExpressionGroup {
                    id: Uuid::new_v4(),
                    promotion_id: promo.id,
                    tier_id: tier.id,
                    sort_order: order as i32,
                    expression_payload: serde_json::json!({"expression": expression}).to_string(),
                };
                group_ids.push(group.id);
                store.insert_group(group);
            }
        }

        for reward in &seed.global_rewards {
            store.link_promotion_reward(promo.id, reward);
        }

        Seeded {
            promotion: promo,
            version,
            group_ids,
        }
    }
}
