//! Runtime request DTOs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

/// Evaluate request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[validate(length(min = 1))]
    pub contact_id: String,

    /// Two-letter country code; case-insensitive
    pub country_iso: String,

    /// Clock reference for every cooldown comparison; defaults to now
    pub as_of_utc: Option<DateTime<Utc>>,

    /// Event fields the rules read (`gasto`, `club`, `esVip`, ...) plus the
    /// optional `eventId` used for idempotency
    #[serde(default)]
    pub ctx: serde_json::Value,
}
