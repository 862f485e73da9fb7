//! Service and HTTP error types.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{dao::storage::StorageError, services::transport::TransportError};

/// Errors that can occur in service layer operations.
///
/// Validation and consistency problems of authored input never show up here: they
/// are reported to the admin as hint text on the authoring form.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The chat platform rejected or did not answer a call.
    #[error("transport failure")]
    Transport(#[source] TransportError),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<TransportError> for ServiceError {
    fn from(err: TransportError) -> Self {
        ServiceError::Transport(err)
    }
}

/// Errors answered directly by an HTTP route.
///
/// Failures of the update handlers never get here: the webhook logs them and answers
/// 200 so the platform does not redeliver.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request did not carry the expected webhook secret.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unauthorized_renders_json_message() {
        let response = AppError::Unauthorized("invalid webhook secret".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "unauthorized: invalid webhook secret");
    }

    #[test]
    fn storage_failure_keeps_its_source() {
        let err = ServiceError::from(crate::dao::storage::StorageError::Rejected("down".into()));
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
