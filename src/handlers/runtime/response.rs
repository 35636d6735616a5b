//! Runtime response DTOs

use serde::Serialize;
use uuid::Uuid;

use crate::services::EvaluationOutcome;

/// One awarded promotion in an evaluate response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResultDto {
    pub promotion_id: Uuid,
    pub version: i32,
    pub country_iso: String,
    pub awarded_tier: i32,
    pub expression_group_id: Uuid,
    pub reward_ids: Vec<Uuid>,
}

impl From<EvaluationOutcome> for EvaluateResultDto {
    fn from(outcome: EvaluationOutcome) -> Self {
        Self {
            promotion_id: outcome.promotion_id,
            version: outcome.version,
            country_iso: outcome.country_iso,
            awarded_tier: outcome.awarded_tier,
            expression_group_id: outcome.expression_group_id,
            reward_ids: outcome.reward_ids,
        }
    }
}
