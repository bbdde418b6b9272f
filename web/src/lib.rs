//! Axum plumbing shared by the stores HTTP services.
//!
//! Services keep their domain logic in pure reducers and a thin service
//! layer; this crate covers the HTTP edge around them:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON
//! │  - Request parsing                      │  ← Correlation ids, logging
//! │  - Response serialization               │  ← Error mapping
//! ├─────────────────────────────────────────┤
//! │         Service layer                   │  ← Load, reduce, save
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Pure business logic (reducers)       │  ← No I/O
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stores_web::{request_tracking_layer, AppError, WebResult};
//!
//! async fn get_requisition(
//!     State(service): State<Arc<RequisitionService>>,
//!     Path(id): Path<String>,
//! ) -> WebResult<Json<RequisitionView>> {
//!     let requisition = service.get(&id.parse()?).await?;
//!     Ok(Json(requisition.into()))
//! }
//!
//! let app = Router::new()
//!     .route("/requisitions/:id", get(get_requisition))
//!     .layer(request_tracking_layer())
//!     .with_state(service);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::CorrelationId;
pub use middleware::{request_tracking_layer, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
