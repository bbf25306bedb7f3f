pub mod acs;
pub mod initiate;
pub mod metadata;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(initiate::initiate))
        .route("/login/callback", post(acs::assertion_consumer_service))
        .route("/metadata", get(metadata::metadata))
}
