pub mod config;
pub mod error;
pub mod principal;
pub mod requests;
pub mod session;
pub mod sp;
pub mod state;
pub mod strategy;

use axum::Router;
use axum::http::StatusCode;
use portal_common::error::{handle_panic, method_not_allowed, not_found};
use state::AppState;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

async fn index() -> StatusCode {
    StatusCode::OK
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", axum::routing::get(index))
        .merge(sp::router())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}
