//! Custom Axum extractors.

use crate::middleware::correlation_id_from_headers;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Uses the id assigned by the request tracking layer when it is installed,
/// then the `X-Correlation-ID` header, and finally generates a new UUID v4.
///
/// ```ignore
/// async fn handler(correlation_id: CorrelationId) -> String {
///     format!("Request ID: {}", correlation_id.0)
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .or_else(|| correlation_id_from_headers(&parts.headers))
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::middleware::CORRELATION_ID_HEADER;
    use axum::http::Request;

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let id = Uuid::new_v4();
        let request = Request::builder()
            .header(CORRELATION_ID_HEADER, id.to_string())
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();

        let extracted = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, CorrelationId(id));
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let assigned = Uuid::new_v4();
        let request = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();
        parts.extensions.insert(assigned);

        let extracted = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted.0, assigned);
    }
}
