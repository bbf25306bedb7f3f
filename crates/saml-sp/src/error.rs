use crate::strategy::AuthError;
use axum::response::{IntoResponse, Response};
use portal_common::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Authentication(#[from] AuthError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// What the client gets to see.
    pub fn public(&self) -> ApiError {
        match self {
            Error::BadRequest(_) => ApiError::BadRequest,
            Error::Authentication(AuthError::Aborted(_)) | Error::Internal(_) => ApiError::Internal,
            Error::Authentication(_) => ApiError::Unauthorized,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.public() {
            ApiError::Internal => tracing::error!(error = %self, "request failed"),
            _ => tracing::warn!(error = %self, "request rejected"),
        }
        self.public().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn authentication_errors_hide_the_reason() {
        let err = Error::from(AuthError::Rejected(
            "signature verification failed: RSA-SHA256 digest mismatch".into(),
        ));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_string(response).await;
        assert_eq!(body, r#"{"message":"Authentication failed"}"#);
    }

    #[tokio::test]
    async fn internal_errors_hide_the_reason() {
        let err = Error::from(anyhow::anyhow!("failed to read /etc/secret.pem"));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert_eq!(body, r#"{"message":"Something went wrong"}"#);
    }

    #[test]
    fn classification() {
        assert_eq!(
            Error::BadRequest("x".into()).public(),
            ApiError::BadRequest
        );
        assert_eq!(
            Error::from(AuthError::UnknownRequest).public(),
            ApiError::Unauthorized
        );
        assert_eq!(
            Error::from(AuthError::TimedOut).public(),
            ApiError::Unauthorized
        );
        assert_eq!(
            Error::from(AuthError::Aborted("task panicked".into())).public(),
            ApiError::Internal
        );
    }

    #[tokio::test]
    async fn aborted_validation_is_an_internal_error() {
        let err = Error::from(AuthError::Aborted("task 7 panicked".into()));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert_eq!(body, r#"{"message":"Something went wrong"}"#);
    }
}
