//! Runtime handlers

mod handler;
pub mod request;
pub mod response;

pub use handler::*;

use axum::{routing::post, Router};

use crate::state::AppState;

/// Runtime routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/evaluate", post(handler::evaluate))
}
