use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::any::Any;

/// The closed set of failures a client can observe. Each variant renders a
/// fixed message; whatever caused it is only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request")]
    BadRequest,
    #[error("Authentication failed")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Something went wrong")]
    Internal,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: &'static str,
}

impl ApiError {
    pub fn status(self) -> StatusCode {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ApiError::BadRequest => "Bad request",
            ApiError::Unauthorized => "Authentication failed",
            ApiError::NotFound => "Not found",
            ApiError::MethodNotAllowed => "Method not allowed",
            ApiError::Internal => "Something went wrong",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorBody {
                message: self.message(),
            }),
        )
            .into_response()
    }
}

/// Router fallback for paths nothing else matched.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Router fallback for known paths hit with a method they don't serve.
/// Must be installed after the routes it covers.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Handler for `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = detail, "request handler panicked");
    ApiError::Internal.into_response()
}
