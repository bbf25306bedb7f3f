use crate::error::Error;
use crate::state::AppState;
use crate::strategy::AuthError;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Receives the identity provider's POSTed SAML Response. The RelayState
/// must name an outstanding AuthnRequest; that request is consumed before
/// validation, so every response gets exactly one attempt. On success the
/// principal is stored in a new session and echoed back.
pub async fn assertion_consumer_service(
    State(state): State<Arc<AppState>>,
    form: Result<Form<AcsForm>, FormRejection>,
) -> Result<Response, Error> {
    let Form(form) = form.map_err(|e| Error::BadRequest(e.body_text()))?;

    let relay_state = form
        .relay_state
        .as_deref()
        .ok_or(AuthError::UnknownRequest)?;

    let request_id = state
        .requests
        .take(relay_state)
        .ok_or(AuthError::UnknownRequest)?;

    let principal = state
        .strategy
        .clone()
        .validate_bounded(form.saml_response, request_id.clone())
        .await?;

    let token = state.sessions.create(principal.clone());

    tracing::info!(
        request_id,
        name_id = principal.name_id.as_deref(),
        attribute_count = principal.attributes.len(),
        "login succeeded"
    );

    let mut response = Json(principal).into_response();
    state.sessions.set_cookie(response.headers_mut(), &token);
    Ok(response)
}
