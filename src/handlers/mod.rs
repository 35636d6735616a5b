//! HTTP Request Handlers
//!
//! This module contains all HTTP request handlers organized by domain.

pub mod authoring;
pub mod health;
pub mod runtime;

use axum::Router;

use crate::state::AppState;

/// Create all API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .nest("/authoring", authoring::routes())
        .nest("/runtime", runtime::routes())
}
