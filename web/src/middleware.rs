//! Request tracking middleware.
//!
//! Every request passing through [`request_tracking_layer`] gets a
//! correlation id (taken from `X-Correlation-ID` when it is a valid UUID,
//! otherwise freshly generated). The id is stored in the request extensions
//! for [`CorrelationId`](crate::extractors::CorrelationId), recorded on an
//! `http_request` tracing span, and echoed back on the response.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/requisitions", post(create))
//!     .layer(request_tracking_layer());
//! ```

use axum::{extract::Request, http::HeaderValue, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Builds the request tracking layer.
#[must_use]
pub const fn request_tracking_layer() -> RequestTrackingLayer {
    RequestTrackingLayer
}

/// Layer installing [`RequestTracking`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestTrackingLayer;

impl<S> Layer<S> for RequestTrackingLayer {
    type Service = RequestTracking<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTracking { inner }
    }
}

/// Service wrapper that assigns correlation ids and logs request outcomes.
#[derive(Clone, Debug)]
pub struct RequestTracking<S> {
    inner: S,
}

/// Reads a valid correlation id from the request headers.
pub(crate) fn correlation_id_from_headers(headers: &axum::http::HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

impl<S> Service<Request> for RequestTracking<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = correlation_id_from_headers(req.headers()).unwrap_or_else(Uuid::new_v4);
        req.extensions_mut().insert(correlation_id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
        );
        let started = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let mut response = fut.await?;

                tracing::info!(
                    status = response.status().as_u16(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Request completed"
                );

                if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
                    response.headers_mut().insert(CORRELATION_ID_HEADER, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
