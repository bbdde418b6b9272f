//! Requisition HTTP router.

use super::handlers;
use crate::service::RequisitionService;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use stores_web::handlers::health_check;
use stores_web::request_tracking_layer;

/// Create the requisition router with all endpoints.
///
/// # Routes
///
/// - `POST /requisitions` - Create a requisition
/// - `POST /requisitions/search` - Find requisitions by field
/// - `GET /requisitions/:id` - Get a requisition
/// - `DELETE /requisitions/:id` - Delete a requisition
/// - `PUT /requisitions/:id/items` - Replace the awaiting items
/// - `POST /requisitions/:id/submit` - Submit for approval
/// - `POST /requisitions/:id/approve` - Approve
/// - `POST /requisitions/:id/decline` - Decline
/// - `POST /requisitions/:id/await-purchase` - Hand over to purchasing
/// - `POST /requisitions/:id/order` - Record the order
/// - `POST /requisitions/:id/receive` - Book in a receipt
/// - `POST /requisitions/:id/complete` - Complete
/// - `POST /requisitions/:id/status` - Set the status from free text
/// - `GET /health` - Health check
///
/// Every request passes through the request tracking layer, which assigns
/// the correlation id echoed in `X-Correlation-ID`.
pub fn requisition_router(service: Arc<RequisitionService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/requisitions", post(handlers::create_requisition))
        .route("/requisitions/search", post(handlers::search_requisitions))
        .route(
            "/requisitions/:id",
            get(handlers::get_requisition).delete(handlers::delete_requisition),
        )
        .route("/requisitions/:id/items", put(handlers::replace_items))
        .route("/requisitions/:id/submit", post(handlers::submit))
        .route("/requisitions/:id/approve", post(handlers::approve))
        .route("/requisitions/:id/decline", post(handlers::decline))
        .route("/requisitions/:id/await-purchase", post(handlers::await_purchase))
        .route("/requisitions/:id/order", post(handlers::mark_ordered))
        .route("/requisitions/:id/receive", post(handlers::receive_item))
        .route("/requisitions/:id/complete", post(handlers::complete))
        .route("/requisitions/:id/status", post(handlers::set_status))
        .layer(request_tracking_layer())
        .with_state(service)
}
