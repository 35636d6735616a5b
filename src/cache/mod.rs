//! Promotion cache
//!
//! Key/value layout serving workflow and manifest bytes on the hot
//! evaluation path. The cache is an optimization, never authoritative: on
//! any error callers fall back to the store.

pub mod keys;
pub mod redis_cache;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{error::AppResult, models::Promotion};

pub use redis_cache::RedisPromotionCache;

/// Cache operations the provider and publisher depend on.
#[async_trait]
pub trait PromotionCache: Send + Sync {
    /// Warm every key of a published `(promotion, version)` in one batched
    /// round-trip. Idempotent: re-warming the same pair only refreshes TTLs;
    /// a higher version advances the index score.
    async fn warm(
        &self,
        promotion: &Promotion,
        country_iso: &str,
        version: i32,
        workflow_payload: &str,
        manifest_payload: &str,
    ) -> AppResult<()>;

    /// Members of the country's active set.
    async fn active_promotions(&self, country_iso: &str) -> AppResult<Vec<Uuid>>;

    /// Latest warmed version of a promotion, from the version index.
    async fn latest_version(&self, country_iso: &str, promotion_id: Uuid) -> AppResult<Option<i32>>;

    /// Workflow payload; resolves the latest version when `version` is None.
    async fn get_workflow(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
        version: Option<i32>,
    ) -> AppResult<Option<String>>;

    /// Manifest payload for a specific version.
    async fn get_manifest(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
        version: i32,
    ) -> AppResult<Option<String>>;

    /// Drop the promotion's current version from the cache: payload keys,
    /// index entry and active-set membership.
    async fn invalidate(&self, country_iso: &str, promotion_id: Uuid) -> AppResult<()>;
}
