//! HTTP handlers for the requisition API.
//!
//! Every mutating request names the acting user in `user` and may pin the
//! revision it was based on with `expectedRevision`.

use crate::reducer::RequisitionEvent;
use crate::requisition::{ReceivedLine, Requisition, RequisitionRecord};
use crate::service::{Created, ItemsUpdated, RequisitionQuery, RequisitionService, Transitioned};
use crate::types::{ComponentId, Department, Quantity, RequisitionId, Status, UserId};
use crate::validation::{ItemsField, NewRequisition, RejectedItem, ValidationError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use stores_core::revision::Revision;
use stores_web::{CorrelationId, WebResult};

/// Shared handler state.
pub type SharedService = Arc<RequisitionService>;

/// A requisition as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionView {
    /// Stored fields
    #[serde(flatten)]
    pub record: RequisitionRecord,

    /// Revision to send back as `expectedRevision`
    pub revision: Revision,
}

impl From<&Requisition> for RequisitionView {
    fn from(requisition: &Requisition) -> Self {
        Self {
            record: requisition.to_record(),
            revision: requisition.revision(),
        }
    }
}

/// Response after creating a requisition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// Human-readable outcome
    pub message: String,

    /// The stored requisition
    pub requisition: RequisitionView,

    /// Items left out; empty unless the creation was partial
    pub rejected_items: Vec<RejectedItem>,
}

/// Body for lifecycle steps that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// Acting user
    #[serde(default)]
    pub user: Option<String>,

    /// Revision the client last saw
    #[serde(default)]
    pub expected_revision: Option<Revision>,
}

/// Body for `POST /requisitions/:id/receive`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveRequest {
    /// Acting user
    #[serde(default)]
    pub user: Option<String>,

    /// Revision the client last saw
    #[serde(default)]
    pub expected_revision: Option<Revision>,

    /// Component that arrived
    #[serde(default)]
    pub id: Option<String>,

    /// Units that arrived (number or numeric string)
    #[serde(default)]
    pub quantity: Option<Value>,
}

/// Body for `POST /requisitions/:id/status`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    /// Acting user
    #[serde(default)]
    pub user: Option<String>,

    /// Revision the client last saw
    #[serde(default)]
    pub expected_revision: Option<Revision>,

    /// New status; unknown values are stored as `NONE`
    #[serde(default)]
    pub status: Option<String>,
}

/// Body for `PUT /requisitions/:id/items`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceItemsRequest {
    /// Acting user
    #[serde(default)]
    pub user: Option<String>,

    /// Revision the client last saw
    #[serde(default)]
    pub expected_revision: Option<Revision>,

    /// Replacement items, as an array or a JSON-encoded string
    pub items: ItemsField,
}

/// Response after replacing items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsResponse {
    /// The stored requisition
    pub requisition: RequisitionView,

    /// Items left out
    pub rejected_items: Vec<RejectedItem>,
}

/// Response after a lifecycle step.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResponse {
    /// The stored requisition
    pub requisition: RequisitionView,

    /// What the step did
    pub events: Vec<RequisitionEvent>,
}

impl From<Transitioned> for TransitionResponse {
    fn from(transitioned: Transitioned) -> Self {
        Self {
            requisition: RequisitionView::from(&transitioned.requisition),
            events: transitioned.events,
        }
    }
}

/// Body for `POST /requisitions/search`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SearchRequest {
    #[serde(default)]
    pub requestee: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub last_updated_by: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub ordered_by: Option<String>,
    #[serde(default)]
    pub received_by: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_completed: Option<DateTime<Utc>>,
}

impl SearchRequest {
    /// Converts to a query. Blank user fields are ignored; statuses and
    /// departments must name a known value.
    ///
    /// # Errors
    ///
    /// `InvalidField` for an unknown status or department.
    pub fn into_query(self) -> Result<RequisitionQuery, ValidationError> {
        let user = |raw: Option<String>| raw.and_then(|raw| raw.parse::<UserId>().ok());

        let status = self
            .status
            .map(|raw| raw.parse::<Status>())
            .transpose()
            .map_err(|e| ValidationError::InvalidField {
                field: "status",
                message: e.to_string(),
            })?;
        let department = self
            .department
            .map(|raw| raw.parse::<Department>())
            .transpose()
            .map_err(|e| ValidationError::InvalidField {
                field: "department",
                message: e.to_string(),
            })?;

        Ok(RequisitionQuery {
            requestee: user(self.requestee),
            status,
            department,
            last_updated_by: user(self.last_updated_by),
            approved_by: user(self.approved_by),
            ordered_by: user(self.ordered_by),
            received_by: user(self.received_by),
            completed: self.completed,
            last_updated: self.last_updated,
            date_approved: self.date_approved,
            date_completed: self.date_completed,
        })
    }
}

fn actor(user: Option<String>) -> Result<UserId, ValidationError> {
    user.and_then(|user| user.parse().ok())
        .ok_or(ValidationError::MissingField("user"))
}

fn received_line(id: Option<String>, quantity: Option<Value>) -> Result<ReceivedLine, ValidationError> {
    let id: ComponentId = id
        .and_then(|id| id.parse().ok())
        .ok_or(ValidationError::MissingField("id"))?;
    let quantity = quantity
        .filter(|quantity| !quantity.is_null())
        .ok_or(ValidationError::MissingField("quantity"))?;
    let quantity = Quantity::parse(&quantity).map_err(|e| ValidationError::InvalidField {
        field: "quantity",
        message: e.to_string(),
    })?;
    Ok(ReceivedLine::new(id, quantity))
}

/// Create a requisition.
///
/// # Endpoint
///
/// ```text
/// POST /requisitions
/// Content-Type: application/json
///
/// {
///   "requestee": "alice",
///   "isStockItem": false,
///   "items": [
///     { "id": "res-10k", "quantity": 20 },
///     { "name": "Bracket", "type": "mechanical", "description": "M3 steel", "quantity": "4" }
///   ]
/// }
/// ```
///
/// Responds `201 Created`. Items that fail validation are left out and
/// listed in `rejectedItems`.
///
/// # Errors
///
/// 422 without a requestee or with an unreadable items field; 409 when the
/// id is taken.
pub async fn create_requisition(
    State(service): State<SharedService>,
    correlation_id: CorrelationId,
    Json(request): Json<NewRequisition>,
) -> WebResult<(StatusCode, Json<CreateResponse>)> {
    tracing::debug!(correlation_id = %correlation_id.0, "Creating requisition");

    let Created {
        requisition,
        rejected_items,
    } = service.create(request).await?;

    let message = if rejected_items.is_empty() {
        "Requisition created"
    } else {
        "Requisition created; some items were rejected"
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            message: message.to_string(),
            requisition: RequisitionView::from(&requisition),
            rejected_items,
        }),
    ))
}

/// Get a requisition by id.
///
/// # Errors
///
/// 404 when it does not exist.
pub async fn get_requisition(
    State(service): State<SharedService>,
    Path(id): Path<String>,
) -> WebResult<Json<RequisitionView>> {
    let requisition = service.get(&RequisitionId::new(id)).await?;
    Ok(Json(RequisitionView::from(&requisition)))
}

/// Search requisitions by field equality.
///
/// # Errors
///
/// 422 for an unknown status or department.
pub async fn search_requisitions(
    State(service): State<SharedService>,
    Json(request): Json<SearchRequest>,
) -> WebResult<Json<Vec<RequisitionView>>> {
    let query = request.into_query().map_err(crate::service::ServiceError::from)?;
    let requisitions = service.find(query).await?;
    Ok(Json(requisitions.iter().map(RequisitionView::from).collect()))
}

/// Delete a requisition.
///
/// # Errors
///
/// 404 when it does not exist.
pub async fn delete_requisition(
    State(service): State<SharedService>,
    correlation_id: CorrelationId,
    Path(id): Path<String>,
) -> WebResult<StatusCode> {
    tracing::info!(correlation_id = %correlation_id.0, requisition_id = %id, "Deleting requisition");
    service.delete(&RequisitionId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the awaiting items.
///
/// # Errors
///
/// 422 without a user or when no item is valid; 404, 409 as for transitions.
pub async fn replace_items(
    State(service): State<SharedService>,
    Path(id): Path<String>,
    Json(request): Json<ReplaceItemsRequest>,
) -> WebResult<Json<ItemsResponse>> {
    let user = actor(request.user).map_err(crate::service::ServiceError::from)?;
    let ItemsUpdated {
        requisition,
        rejected_items,
    } = service
        .replace_items(&RequisitionId::new(id), request.items, user, request.expected_revision)
        .await?;

    Ok(Json(ItemsResponse {
        requisition: RequisitionView::from(&requisition),
        rejected_items,
    }))
}

macro_rules! transition_handler {
    ($(#[$doc:meta])* $name:ident => $method:ident) => {
        $(#[$doc])*
        ///
        /// # Errors
        ///
        /// 422 without a user or when the requisition is completed; 404 when
        /// it does not exist; 409 on a stale `expectedRevision`.
        pub async fn $name(
            State(service): State<SharedService>,
            Path(id): Path<String>,
            Json(request): Json<TransitionRequest>,
        ) -> WebResult<Json<TransitionResponse>> {
            let user = actor(request.user).map_err(crate::service::ServiceError::from)?;
            let transitioned = service
                .$method(&RequisitionId::new(id), user, request.expected_revision)
                .await?;
            Ok(Json(transitioned.into()))
        }
    };
}

transition_handler!(
    /// Submit for approval (`POST /requisitions/:id/submit`).
    submit => submit
);
transition_handler!(
    /// Approve (`POST /requisitions/:id/approve`).
    approve => approve
);
transition_handler!(
    /// Decline (`POST /requisitions/:id/decline`).
    decline => decline
);
transition_handler!(
    /// Hand over to purchasing (`POST /requisitions/:id/await-purchase`).
    await_purchase => await_purchase
);
transition_handler!(
    /// Record the order (`POST /requisitions/:id/order`).
    mark_ordered => mark_ordered
);
transition_handler!(
    /// Complete (`POST /requisitions/:id/complete`).
    complete => complete
);

/// Book in a receipt.
///
/// ```text
/// POST /requisitions/req-1/receive
///
/// { "user": "walter", "id": "res-10k", "quantity": 5 }
/// ```
///
/// An `id` that matches no awaiting item changes nothing; the response
/// carries an `itemReceived` event with outcome `UNMATCHED`.
///
/// # Errors
///
/// 422 on a missing field, an invalid quantity or over-receipt.
pub async fn receive_item(
    State(service): State<SharedService>,
    Path(id): Path<String>,
    Json(request): Json<ReceiveRequest>,
) -> WebResult<Json<TransitionResponse>> {
    let (user, line) = actor(request.user)
        .and_then(|user| Ok((user, received_line(request.id, request.quantity)?)))
        .map_err(crate::service::ServiceError::from)?;

    let transitioned = service
        .receive_item(&RequisitionId::new(id), line, user, request.expected_revision)
        .await?;
    Ok(Json(transitioned.into()))
}

/// Set the status from free text.
///
/// # Errors
///
/// 422 without a user or status.
pub async fn set_status(
    State(service): State<SharedService>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> WebResult<Json<TransitionResponse>> {
    let (user, status) = actor(request.user)
        .and_then(|user| {
            let status = request.status.ok_or(ValidationError::MissingField("status"))?;
            Ok((user, status))
        })
        .map_err(crate::service::ServiceError::from)?;

    let transitioned = service
        .set_status(&RequisitionId::new(id), status, user, request.expected_revision)
        .await?;
    Ok(Json(transitioned.into()))
}
