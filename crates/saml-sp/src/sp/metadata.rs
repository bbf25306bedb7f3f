use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use portal_common::ApiError;
use std::sync::Arc;

/// Serves this service provider's metadata XML for the identity provider.
pub async fn metadata(State(state): State<Arc<AppState>>) -> Response {
    match state.strategy.metadata_xml() {
        Ok(xml) => (
            [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
            xml,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to generate SP metadata");
            ApiError::Internal.into_response()
        }
    }
}
