//! Axum router wiring.

use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::app_state::AppState;
use crate::transport::{guard, http};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::report))
        .route("/metrics", get(http::report))
        .route("/ping", get(http::ping))
        .route("/update", post(http::update_json))
        .route("/update/:mtype/:name/:value", post(http::update_path))
        .route("/updates", post(http::update_batch))
        .route("/value", post(http::value_json))
        .route("/value/:mtype/:name", get(http::value_path))
        .layer(middleware::from_fn_with_state(state.clone(), guard::trusted_subnet))
        .with_state(state)
}
