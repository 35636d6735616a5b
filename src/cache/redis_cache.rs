//! Redis-backed promotion cache

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::{
    cache::{keys, PromotionCache},
    error::AppResult,
    models::Promotion,
};

/// Redis implementation of the promotion cache.
#[derive(Clone)]
pub struct RedisPromotionCache {
    conn: ConnectionManager,
    key_expiry_secs: u64,
}

impl RedisPromotionCache {
    pub fn new(conn: ConnectionManager, key_expiry_secs: u64) -> Self {
        Self {
            conn,
            key_expiry_secs,
        }
    }

    async fn resolve_version(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
    ) -> AppResult<Option<i32>> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn
            .zscore(keys::index_key(country_iso), promotion_id.to_string())
            .await?;
        Ok(score.map(|s| s as i32))
    }
}

#[async_trait]
impl PromotionCache for RedisPromotionCache {
    async fn warm(
        &self,
        promotion: &Promotion,
        country_iso: &str,
        version: i32,
        workflow_payload: &str,
        manifest_payload: &str,
    ) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let workflow_key = keys::workflow_key(country_iso, promotion.id, version);
        let manifest_key = keys::manifest_key(country_iso, promotion.id, version);
        let member = promotion.id.to_string();
        let cooldown = promotion.global_cooldown_days.to_string();

        // One batched round-trip: the promotion appears atomically for
        // readers once the pipeline lands.
        let _: () = redis::pipe()
            .atomic()
            .set_ex(&workflow_key, workflow_payload, self.key_expiry_secs)
            .set_ex(&manifest_key, manifest_payload, self.key_expiry_secs)
            .zadd(keys::index_key(country_iso), &member, version)
            .sadd(keys::active_key(country_iso), &member)
            .hset_multiple(
                keys::metadata_key(promotion.id),
                &[
                    ("name", promotion.name.as_str()),
                    ("timezone", promotion.timezone.as_str()),
                    ("globalCooldownDays", cooldown.as_str()),
                ],
            )
            .query_async(&mut conn)
            .await?;

        // Post-check that the payload keys actually landed.
        let (workflow_ok, manifest_ok): (bool, bool) = redis::pipe()
            .exists(&workflow_key)
            .exists(&manifest_key)
            .query_async(&mut conn)
            .await?;
        if !workflow_ok || !manifest_ok {
            tracing::warn!(
                promotion_id = %promotion.id,
                country = country_iso,
                version,
                "Cache warm post-check failed; payload keys missing"
            );
        } else {
            tracing::info!(
                promotion_id = %promotion.id,
                country = country_iso,
                version,
                "Warmed promotion cache"
            );
        }

        Ok(())
    }

    async fn active_promotions(&self, country_iso: &str) -> AppResult<Vec<Uuid>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(keys::active_key(country_iso)).await?;

        let mut ids: Vec<Uuid> = members
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn latest_version(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
    ) -> AppResult<Option<i32>> {
        self.resolve_version(country_iso, promotion_id).await
    }

    async fn get_workflow(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
        version: Option<i32>,
    ) -> AppResult<Option<String>> {
        let version = match version {
            Some(v) => v,
            None => match self.resolve_version(country_iso, promotion_id).await? {
                Some(v) => v,
                None => return Ok(None),
            },
        };

        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(keys::workflow_key(country_iso, promotion_id, version))
            .await?;
        Ok(payload)
    }

    async fn get_manifest(
        &self,
        country_iso: &str,
        promotion_id: Uuid,
        version: i32,
    ) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(keys::manifest_key(country_iso, promotion_id, version))
            .await?;
        Ok(payload)
    }

    async fn invalidate(&self, country_iso: &str, promotion_id: Uuid) -> AppResult<()> {
        let current = self.resolve_version(country_iso, promotion_id).await?;
        let mut conn = self.conn.clone();
        let member = promotion_id.to_string();

        let mut pipe = redis::pipe();
        pipe.atomic();
        if let Some(version) = current {
            pipe.del(keys::workflow_key(country_iso, promotion_id, version));
            pipe.del(keys::manifest_key(country_iso, promotion_id, version));
        }
        pipe.zrem(keys::index_key(country_iso), &member);
        pipe.srem(keys::active_key(country_iso), &member);
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::info!(
            promotion_id = %promotion_id,
            country = country_iso,
            "Invalidated promotion cache"
        );
        Ok(())
    }
}
