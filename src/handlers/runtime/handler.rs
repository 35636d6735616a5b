//! Runtime handler implementations

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    services::EvaluationInput,
    state::AppState,
    utils::{time::now_utc, validation::validate_country_iso},
};

use super::{request::EvaluateRequest, response::EvaluateResultDto};

/// Evaluate an inbound event against the active promotions of a country
pub async fn evaluate(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> AppResult<Json<Vec<EvaluateResultDto>>> {
    payload.validate()?;

    let country = payload.country_iso.trim().to_uppercase();
    validate_country_iso(&country).map_err(|e| AppError::Validation(e.to_string()))?;

    let input = EvaluationInput {
        contact_id: payload.contact_id,
        country_iso: country,
        as_of_utc: payload.as_of_utc.unwrap_or_else(now_utc),
        event_context: payload.ctx,
    };

    let outcomes = state.evaluator().evaluate(&input).await?;
    Ok(Json(outcomes.into_iter().map(Into::into).collect()))
}
