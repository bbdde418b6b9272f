//! HTTP error type shared by the stores services.
//!
//! Services map their own error enums into [`AppError`] at the HTTP edge.
//! Clients receive a JSON body with a stable `code`, a message and optional
//! `details`; the underlying cause is only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Error returned from web handlers.
///
/// # Examples
///
/// ```ignore
/// impl From<ServiceError> for AppError {
///     fn from(error: ServiceError) -> Self {
///         match error {
///             ServiceError::NotFound(id) => AppError::not_found("Requisition", id),
///             ServiceError::Store(e) => AppError::internal("Store unavailable").with_source(e.into()),
///             // ...
///         }
///     }
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Error with an explicit status and machine-readable code.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// 404 for a missing `resource`.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} with id {id} not found"),
        )
    }

    /// 409: the request lost a race or collides with existing data.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// 422: the request body is incomplete or malformed.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// 422: the request was well-formed but the domain refused it.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "REJECTED", message)
    }

    /// 500. Put the cause in [`AppError::with_source`], not in the message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    /// Attaches the cause; it is logged but never sent to the client.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attaches a structured payload returned as `details`.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Client-facing message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let cause = self.source.as_ref().map(|source| format!("{source:#}"));
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, code = self.code, message = %self.message, cause = cause.as_deref(), "Request failed");
        } else {
            tracing::debug!(status = %self.status, code = self.code, message = %self.message, "Request refused");
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn display_shows_code_and_message() {
        let error = AppError::not_found("Requisition", "req-1");
        assert_eq!(error.to_string(), "[NOT_FOUND] Requisition with id req-1 not found");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn details_are_returned_to_the_client() {
        let error = AppError::validation("no valid items").with_details(json!({ "rejectedItems": [] }));

        let (status, body) = body(error).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body,
            json!({
                "code": "VALIDATION_ERROR",
                "message": "no valid items",
                "details": { "rejectedItems": [] }
            })
        );
    }

    #[tokio::test]
    async fn source_is_not_leaked() {
        let error = AppError::internal("Store unavailable")
            .with_source(anyhow::anyhow!("password authentication failed"));
        assert!(std::error::Error::source(&error).is_some());

        let (status, body) = body(error).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("password"));
        assert!(body.get("details").is_none());
    }
}
