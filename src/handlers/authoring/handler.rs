//! Authoring handler implementations

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::repositories::CatalogRepository,
    error::AppResult,
    services::{AuthoringService, PublishService},
    state::AppState,
};

use super::{
    request::DraftUpsertRequest,
    response::{CatalogsResponse, DraftUpsertResponse, PublishResponse},
};

/// Create or update a draft version, compiling its workflow
pub async fn upsert_draft(
    State(state): State<AppState>,
    Json(payload): Json<DraftUpsertRequest>,
) -> AppResult<Json<DraftUpsertResponse>> {
    payload.validate()?;

    let response = AuthoringService::upsert_draft(state.db(), payload).await?;
    Ok(Json(response))
}

/// Publish the latest version of a promotion in a country
pub async fn publish(
    State(state): State<AppState>,
    Path((promotion_id, country_iso)): Path<(Uuid, String)>,
) -> AppResult<Json<PublishResponse>> {
    let response =
        PublishService::publish(state.db(), state.cache().as_ref(), promotion_id, &country_iso)
            .await?;
    Ok(Json(response))
}

/// List exposed attributes and active operators for rule builders
pub async fn list_catalogs(State(state): State<AppState>) -> AppResult<Json<CatalogsResponse>> {
    let attributes = CatalogRepository::attributes(state.db()).await?;
    let operators = CatalogRepository::operators(state.db()).await?;

    Ok(Json(CatalogsResponse {
        attributes: attributes.into_iter().map(Into::into).collect(),
        operators: operators.into_iter().map(Into::into).collect(),
    }))
}
