//! Health check endpoints.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Liveness payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    /// Always `"ok"` when the process answers
    pub status: &'static str,
    /// Crate version of the running binary
    pub version: &'static str,
}

/// Simple liveness check.
///
/// Returns 200 OK without touching any dependency.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthReport>) {
    (
        StatusCode::OK,
        Json(HealthReport {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }
}
