use crate::error::Error;
use crate::session::CurrentSession;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Starts SP-initiated login: records a fresh AuthnRequest as outstanding and
/// sends the user agent to the identity provider's entry point. A caller that
/// already holds a live session gets its principal back instead.
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    CurrentSession(principal): CurrentSession,
) -> Result<Response, Error> {
    if let Some(principal) = principal {
        return Ok(Json(principal).into_response());
    }

    let redirect = state.strategy.initiate()?;

    state
        .requests
        .insert(redirect.relay_state.clone(), redirect.request_id.clone());

    tracing::info!(
        request_id = redirect.request_id,
        "redirecting to identity provider"
    );

    Ok((StatusCode::FOUND, [(header::LOCATION, redirect.location)]).into_response())
}
