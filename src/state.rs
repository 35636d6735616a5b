//! Application state management
//!
//! This module contains the shared application state that is passed
//! to all request handlers via Axum's State extractor.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use plutus_rules::prelude::WorkflowEngine;

use crate::{
    cache::{PromotionCache, RedisPromotionCache},
    config::Config,
    db::{PgPromotionStore, PromotionStore},
    services::{
        GrantService, PromotionEvaluator, PromotionProvider, RedisSegmentLookup, SegmentLookup,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    /// Database connection pool
    db: PgPool,

    /// Redis connection manager
    redis: ConnectionManager,

    /// Cache-layer view of the promotions
    cache: Arc<dyn PromotionCache>,

    /// The evaluation state machine
    evaluator: Arc<PromotionEvaluator>,

    /// Application configuration
    config: Config,
}

impl AppState {
    /// Create a new application state, wiring the store, cache, segment
    /// lookup, workflow engine and evaluator together.
    pub fn new(db: PgPool, redis: ConnectionManager, config: Config) -> Self {
        let store: Arc<dyn PromotionStore> = Arc::new(PgPromotionStore::new(db.clone()));
        let cache: Arc<dyn PromotionCache> = Arc::new(RedisPromotionCache::new(
            redis.clone(),
            config.cache.default_key_expiry_secs,
        ));
        let segments: Arc<dyn SegmentLookup> = Arc::new(RedisSegmentLookup::new(redis.clone()));
        let engine = Arc::new(WorkflowEngine::new(
            config.evaluation.workflow_cache_cap,
            config.evaluation.rule_timeout,
        ));
        let provider = Arc::new(PromotionProvider::new(store.clone(), cache.clone()));
        let grants = Arc::new(GrantService::new(store.clone()));
        let evaluator = Arc::new(PromotionEvaluator::new(
            provider,
            store,
            cache.clone(),
            segments,
            engine,
            grants,
        ));

        Self {
            inner: Arc::new(AppStateInner {
                db,
                redis,
                cache,
                evaluator,
                config,
            }),
        }
    }

    /// Get a reference to the database pool
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get a clone of the Redis connection manager
    pub fn redis(&self) -> ConnectionManager {
        self.inner.redis.clone()
    }

    /// Get the promotion cache
    pub fn cache(&self) -> Arc<dyn PromotionCache> {
        self.inner.cache.clone()
    }

    /// Get the promotion evaluator
    pub fn evaluator(&self) -> Arc<PromotionEvaluator> {
        self.inner.evaluator.clone()
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
