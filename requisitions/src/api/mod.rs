//! HTTP API for requisitions.
//!
//! Handlers parse the loosely typed request bodies into domain values, call
//! [`RequisitionService`](crate::service::RequisitionService) and map
//! [`ServiceError`] onto [`AppError`]:
//!
//! | Error | Status |
//! |---|---|
//! | `Validation` | 422 `VALIDATION_ERROR` |
//! | `NotFound` | 404 |
//! | `AlreadyExists`, `Conflict` | 409 |
//! | `Lifecycle` | 422 `REJECTED` |
//! | `Store` | 500 |

pub mod handlers;
pub mod router;

pub use router::requisition_router;

use crate::service::ServiceError;
use crate::validation::ValidationError;
use serde_json::{Map, Value};
use stores_web::AppError;

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(ValidationError::AllItemsRejected { rejected }) => {
                let message = format!("none of the {} supplied items are valid", rejected.len());
                match serde_json::to_value(&rejected) {
                    Ok(items) => {
                        let mut details = Map::new();
                        details.insert("rejectedItems".to_string(), items);
                        Self::validation(message).with_details(Value::Object(details))
                    },
                    Err(_) => Self::validation(message),
                }
            },
            ServiceError::Validation(validation) => Self::validation(validation.to_string()),
            ServiceError::NotFound(id) => Self::not_found("Requisition", id),
            ServiceError::AlreadyExists(id) => {
                Self::conflict(format!("Requisition with id {id} already exists"))
            },
            error @ ServiceError::Conflict { .. } => Self::conflict(error.to_string()),
            ServiceError::Lifecycle(lifecycle) => Self::rejected(lifecycle.to_string()),
            ServiceError::Store(store) => {
                Self::internal("Requisition store unavailable").with_source(store.into())
            },
        }
    }
}
