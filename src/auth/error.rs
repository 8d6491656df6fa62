// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Verification failures never surface here in detail: the decider folds
/// them into `Unauthenticated` before the HTTP layer sees them.
#[derive(Debug)]
pub enum AuthError {
    /// Request could not be authenticated
    Unauthenticated,
    /// Handler asked for an identity but the auth middleware is not mounted
    MissingIdentity,
    /// Body larger than the configured buffer limit
    PayloadTooLarge,
    /// Body could not be read
    InvalidBody(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthorized",
            AuthError::MissingIdentity => "missing_identity",
            AuthError::PayloadTooLarge => "payload_too_large",
            AuthError::InvalidBody(_) => "invalid_body",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::MissingIdentity => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AuthError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Unauthenticated => write!(f, "You are not authorized"),
            AuthError::MissingIdentity => {
                write!(f, "Request identity unavailable (authentication layer not installed)")
            }
            AuthError::PayloadTooLarge => write!(f, "Request body is too large"),
            AuthError::InvalidBody(msg) => write!(f, "Request body could not be read: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unauthenticated_returns_401() {
        let response = AuthError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "unauthorized");
    }

    #[tokio::test]
    async fn missing_identity_is_a_server_error() {
        let response = AuthError::MissingIdentity.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn body_errors_map_to_client_errors() {
        assert_eq!(AuthError::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            AuthError::InvalidBody("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
