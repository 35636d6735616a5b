//! Authoring handlers

mod handler;
pub mod request;
pub mod response;

pub use handler::*;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Authoring routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/promotions/draft", post(handler::upsert_draft))
        .route(
            "/promotions/:promotion_id/:country_iso/publish",
            post(handler::publish),
        )
        .route("/catalogs", get(handler::list_catalogs))
}
