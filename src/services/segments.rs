//! Segment lookup
//!
//! Contact segmentation is owned by an external service; the evaluator only
//! knows this trait. The Redis adapter reads the segment sets that service
//! maintains.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::AppResult;

/// Segments a contact belongs to within a country.
#[async_trait]
pub trait SegmentLookup: Send + Sync {
    async fn segments_for_contact(
        &self,
        contact_id: &str,
        country_iso: &str,
    ) -> AppResult<Vec<String>>;
}

/// Redis-set adapter: `segments:{COUNTRY}:{contactId}`.
#[derive(Clone)]
pub struct RedisSegmentLookup {
    conn: ConnectionManager,
}

impl RedisSegmentLookup {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(contact_id: &str, country_iso: &str) -> String {
        format!("segments:{}:{}", country_iso.to_uppercase(), contact_id)
    }
}

#[async_trait]
impl SegmentLookup for RedisSegmentLookup {
    async fn segments_for_contact(
        &self,
        contact_id: &str,
        country_iso: &str,
    ) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let segments: Vec<String> = conn.smembers(Self::key(contact_id, country_iso)).await?;
        Ok(segments)
    }
}
