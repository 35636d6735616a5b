//! Promotion provider
//!
//! Unified read path for the hot evaluation loop: cache first, store
//! fallback. Results are deterministic for a given `(country, t, store,
//! cache)` state and ordered by promotion id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use plutus_rules::workflow::Workflow;
use uuid::Uuid;

use crate::{
    cache::PromotionCache,
    db::PromotionStore,
    error::AppResult,
    models::{Manifest, Promotion},
};

/// An active `(promotion, version)` pair, reconstituted with its parsed
/// workflow and manifest.
#[derive(Debug, Clone)]
pub struct ActivePromotion {
    pub promotion: Promotion,
    pub version: i32,
    pub country_iso: String,
    pub workflow: Workflow,
    /// None when the manifest payload failed to parse; gates then fail open.
    pub manifest: Option<Manifest>,
    pub workflow_payload: String,
    pub manifest_payload: String,
}

impl ActivePromotion {
    /// Global cooldown for tier 1: the published manifest wins over the
    /// promotion row, which may have drifted since publication.
    pub fn global_cooldown_days(&self) -> i32 {
        self.manifest
            .as_ref()
            .map(|m| m.policies.global_cooldown_days)
            .unwrap_or(self.promotion.global_cooldown_days)
    }

    /// Exclusivity policy; an unparseable manifest defaults to exclusive.
    pub fn exclusive_per_event(&self) -> bool {
        self.manifest
            .as_ref()
            .map(|m| m.policies.exclusive_per_event)
            .unwrap_or(true)
    }
}

/// Cache-first provider over the two-tier promotion store.
pub struct PromotionProvider {
    store: Arc<dyn PromotionStore>,
    cache: Arc<dyn PromotionCache>,
}

impl PromotionProvider {
    pub fn new(store: Arc<dyn PromotionStore>, cache: Arc<dyn PromotionCache>) -> Self {
        Self { store, cache }
    }

    /// Active promotions for `(country, t)`.
    ///
    /// The cache path filters by the manifest window; the store fallback
    /// applies the same filter in SQL. The cache is never authoritative: an
    /// empty or failing cache falls through to the store.
    pub async fn active_promotions(
        &self,
        country_iso: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ActivePromotion>> {
        match self.from_cache(country_iso, at).await {
            Ok(found) if !found.is_empty() => return Ok(found),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(country = country_iso, "Cache read failed, falling back to store: {}", e);
            }
        }

        self.from_store(country_iso, at).await
    }

    async fn from_cache(
        &self,
        country_iso: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ActivePromotion>> {
        let ids = self.cache.active_promotions(country_iso).await?;

        let mut result = Vec::with_capacity(ids.len());
        for promotion_id in ids {
            match self.load_cached(country_iso, promotion_id, at).await? {
                Some(active) => result.push(active),
                None => continue,
            }
        }
        result.sort_by(|a, b| a.promotion.id.cmp(&b.promotion.id));
        Ok(result)
    }

    /// Assemble one promotion from cache payloads plus store metadata.
    /// Returns Ok(None) when the promotion drops out (missing keys, outside
    /// window, unparseable workflow).
    async fn load_cached(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ActivePromotion>> {
        let version = match self.cache.latest_version(country_iso, promotion_id).await? {
            Some(v) => v,
            None => {
                tracing::warn!(promotion_id = %promotion_id, "Promotion in active set but missing from version index");
                return Ok(None);
            }
        };

        let workflow_payload = match self
            .cache
            .get_workflow(country_iso, promotion_id, Some(version))
            .await?
        {
            Some(p) => p,
            None => return Ok(None),
        };
        let manifest_payload = match self
            .cache
            .get_manifest(country_iso, promotion_id, version)
            .await?
        {
            Some(p) => p,
            None => return Ok(None),
        };

        let manifest = parse_manifest(&manifest_payload, promotion_id);
        if let Some(manifest) = &manifest {
            if !manifest.active_at(at) {
                return Ok(None);
            }
        }

        let workflow = match parse_workflow(&workflow_payload, promotion_id) {
            Some(w) => w,
            None => return Ok(None),
        };

        // Slow-changing metadata comes from the store once per id.
        let promotion = match self.store.find_promotion(promotion_id).await? {
            Some(p) => p,
            None => {
                tracing::warn!(promotion_id = %promotion_id, "Cached promotion missing from store");
                return Ok(None);
            }
        };

        Ok(Some(ActivePromotion {
            promotion,
            version,
            country_iso: country_iso.to_uppercase(),
            workflow,
            manifest,
            workflow_payload,
            manifest_payload,
        }))
    }

    async fn from_store(
        &self,
        country_iso: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ActivePromotion>> {
        let versions = self.store.active_versions(country_iso, at).await?;

        let mut result = Vec::with_capacity(versions.len());
        for (promotion, version) in versions {
            let workflow = match parse_workflow(&version.workflow_payload, promotion.id) {
                Some(w) => w,
                None => continue,
            };
            let manifest = parse_manifest(&version.manifest_payload, promotion.id);

            result.push(ActivePromotion {
                promotion,
                version: version.version,
                country_iso: version.country_iso.clone(),
                workflow,
                manifest,
                workflow_payload: version.workflow_payload,
                manifest_payload: version.manifest_payload,
            });
        }
        result.sort_by(|a, b| a.promotion.id.cmp(&b.promotion.id));
        Ok(result)
    }
}

fn parse_workflow(payload: &str, promotion_id: Uuid) -> Option<Workflow> {
    match serde_json::from_str(payload) {
        Ok(workflow) => Some(workflow),
        Err(e) => {
            tracing::warn!(promotion_id = %promotion_id, "Unparseable workflow payload: {}", e);
            None
        }
    }
}

fn parse_manifest(payload: &str, promotion_id: Uuid) -> Option<Manifest> {
    match Manifest::parse(payload) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            tracing::warn!(promotion_id = %promotion_id, "Unparseable manifest payload: {}", e);
            None
        }
    }
}
