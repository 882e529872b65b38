//! The one place internal errors become HTTP responses.
//!
//! Every error body is `{"detail": "<message>"}`. Token codec failures are
//! already logged by the gate and all surface as the same 401 here.

use crate::auth::AuthError;
use crate::books::BookError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authentication cookie missing")]
    AuthenticationMissing,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Registration is disabled")]
    RegistrationDisabled,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Book not found")]
    BookNotFound,
    #[error("File not found")]
    FileMissing,
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::AuthenticationMissing | Self::AuthenticationFailed => {
                StatusCode::UNAUTHORIZED
            }
            Self::PermissionDenied | Self::RegistrationDisabled => StatusCode::FORBIDDEN,
            Self::UsernameTaken | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::BookNotFound | Self::FileMissing => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::AuthenticationMissing => Self::AuthenticationMissing,
            AuthError::AuthenticationFailed(_) => Self::AuthenticationFailed,
            AuthError::PermissionDenied { .. } => Self::PermissionDenied,
            AuthError::UsernameTaken => Self::UsernameTaken,
            AuthError::InvalidRequest(reason) => Self::InvalidRequest(reason),
            AuthError::Internal(e) => Self::Internal(e),
        }
    }
}

impl From<BookError> for ApiError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::FileMissing(_) => Self::FileMissing,
            BookError::InvalidInput(reason) => Self::InvalidRequest(reason),
            other @ (BookError::Database(_) | BookError::Io(_)) => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            tracing::error!("Request failed: {e:#}");
        }
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, TokenError};
    use http_body_util::BodyExt;

    async fn detail(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json["detail"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn auth_errors_follow_the_mapping_table() {
        let cases = [
            (AuthError::InvalidCredentials, 401, "Invalid credentials"),
            (AuthError::AuthenticationMissing, 401, "Authentication cookie missing"),
            (
                AuthError::PermissionDenied {
                    required: Role::Admin,
                },
                403,
                "Permission denied",
            ),
            (AuthError::UsernameTaken, 400, "Username already exists"),
            (
                AuthError::InvalidRequest("Password cannot be empty".into()),
                400,
                "Password cannot be empty",
            ),
        ];
        for (err, status, message) in cases {
            let (got_status, got_message) = detail(err.into()).await;
            assert_eq!(got_status.as_u16(), status);
            assert_eq!(got_message, message);
        }
    }

    #[tokio::test]
    async fn codec_failures_share_one_response() {
        let mut seen = Vec::new();
        for kind in [
            TokenError::Expired,
            TokenError::BadSignature,
            TokenError::Malformed("x".into()),
        ] {
            seen.push(detail(AuthError::AuthenticationFailed(kind).into()).await);
        }
        assert!(seen
            .iter()
            .all(|r| *r == (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())));
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let err = ApiError::internal(anyhow::anyhow!("disk on fire at /var/lib"));
        let (status, message) = detail(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn book_errors_map_to_status() {
        assert_eq!(
            ApiError::from(BookError::FileMissing("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(BookError::InvalidInput("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
