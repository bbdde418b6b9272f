//! Requisition service: the imperative shell around the reducer.
//!
//! Every operation that changes a requisition follows the same steps:
//!
//! 1. validate the request (no store access yet)
//! 2. load the requisition and remember its revision
//! 3. run the action through [`RequisitionReducer`]
//! 4. write the result back, asserting the revision from step 2
//!
//! A concurrent writer that got in between steps 2 and 4 makes step 4 fail
//! with [`ServiceError::Conflict`]; nothing is retried here.

use crate::reducer::{RequisitionAction, RequisitionEnvironment, RequisitionEvent, RequisitionReducer};
use crate::requisition::{LifecycleError, ReceivedLine, Requisition, RequisitionRecord};
use crate::types::{Department, RequisitionId, Status, UserId};
use crate::validation::{
    build_requisition, check_items, Built, CheckedItems, ItemsField, NewRequisition, RejectedItem,
    ValidationError,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use stores_core::document::{Document, Filter};
use stores_core::document_store::{DocumentStore, DocumentStoreError};
use stores_core::environment::Clock;
use stores_core::reducer::Reducer;
use stores_core::revision::Revision;
use thiserror::Error;

/// Collection holding requisition documents
pub const COLLECTION: &str = "requisitions";

/// Errors returned by [`RequisitionService`].
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request was incomplete or malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No requisition with this id
    #[error("Requisition not found: {0}")]
    NotFound(RequisitionId),

    /// A requisition with this id already exists
    #[error("Requisition already exists: {0}")]
    AlreadyExists(RequisitionId),

    /// The requisition changed since the caller read it
    #[error("Requisition {id} was modified concurrently: expected revision {expected}, found {actual}")]
    Conflict {
        /// Requisition that changed
        id: RequisitionId,
        /// Revision the caller worked from
        expected: Revision,
        /// Revision currently stored
        actual: Revision,
    },

    /// The lifecycle refused the action
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The document store failed
    #[error("Store error: {0}")]
    Store(DocumentStoreError),
}

impl From<DocumentStoreError> for ServiceError {
    fn from(error: DocumentStoreError) -> Self {
        match error {
            DocumentStoreError::NotFound { id, .. } => Self::NotFound(RequisitionId::new(id.into_inner())),
            DocumentStoreError::AlreadyExists { id, .. } => {
                Self::AlreadyExists(RequisitionId::new(id.into_inner()))
            },
            DocumentStoreError::ConcurrencyConflict { id, expected, actual } => {
                metrics::counter!("requisitions.conflicts").increment(1);
                Self::Conflict {
                    id: RequisitionId::new(id.into_inner()),
                    expected,
                    actual,
                }
            },
            other => Self::Store(other),
        }
    }
}

/// Result of [`RequisitionService::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// The stored requisition
    pub requisition: Requisition,
    /// Items left out; non-empty means the creation was partial
    pub rejected_items: Vec<RejectedItem>,
}

/// Result of [`RequisitionService::replace_items`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemsUpdated {
    /// The stored requisition
    pub requisition: Requisition,
    /// Items left out
    pub rejected_items: Vec<RejectedItem>,
}

/// Result of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transitioned {
    /// The stored requisition
    pub requisition: Requisition,
    /// What happened
    pub events: Vec<RequisitionEvent>,
}

/// Equality query over stored requisitions. Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RequisitionQuery {
    pub requestee: Option<UserId>,
    pub status: Option<Status>,
    pub department: Option<Department>,
    pub last_updated_by: Option<UserId>,
    pub approved_by: Option<UserId>,
    pub ordered_by: Option<UserId>,
    pub received_by: Option<UserId>,
    pub completed: Option<bool>,
    pub last_updated: Option<DateTime<Utc>>,
    pub date_approved: Option<DateTime<Utc>>,
    pub date_completed: Option<DateTime<Utc>>,
}

impl RequisitionQuery {
    /// Requisitions raised by `requestee`
    #[must_use]
    pub fn by_requestee(requestee: UserId) -> Self {
        Self {
            requestee: Some(requestee),
            ..Self::default()
        }
    }

    /// Requisitions in `status`
    #[must_use]
    pub fn by_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Requisitions owned by `department`
    #[must_use]
    pub fn by_department(department: Department) -> Self {
        Self {
            department: Some(department),
            ..Self::default()
        }
    }

    /// Document filter matching the stored field names
    #[must_use]
    pub fn to_filter(&self) -> Filter {
        let users = [
            ("requestee", &self.requestee),
            ("lastUpdatedBy", &self.last_updated_by),
            ("approvedBy", &self.approved_by),
            ("orderedBy", &self.ordered_by),
            ("receivedBy", &self.received_by),
        ];

        let mut filter = Filter::all();
        for (field, user) in users {
            if let Some(user) = user {
                filter = filter.and(field, user.as_str());
            }
        }
        if let Some(status) = self.status {
            filter = filter.and("status", status.as_str());
        }
        if let Some(department) = self.department {
            filter = filter.and("department", department.as_str());
        }
        if let Some(completed) = self.completed {
            filter = filter.and("completed", completed);
        }

        // Dates are matched exactly, in the form the record serializes them
        let dates = [
            ("lastUpdated", self.last_updated),
            ("dateApproved", self.date_approved),
            ("dateCompleted", self.date_completed),
        ];
        for (field, date) in dates {
            if let Some(date) = date {
                filter = filter.and(field, date.to_rfc3339_opts(SecondsFormat::AutoSi, true));
            }
        }
        filter
    }
}

fn encode(requisition: &Requisition) -> Result<Value, ServiceError> {
    serde_json::to_value(requisition.to_record())
        .map_err(|e| ServiceError::Store(DocumentStoreError::SerializationError(e.to_string())))
}

fn require_actor(actor: &UserId) -> Result<(), ValidationError> {
    if actor.as_str().trim().is_empty() {
        return Err(ValidationError::MissingField("user"));
    }
    Ok(())
}

fn decode(document: Document) -> Result<Requisition, ServiceError> {
    let record: RequisitionRecord = serde_json::from_value(document.body).map_err(|e| {
        ServiceError::Store(DocumentStoreError::SerializationError(format!(
            "requisition {}: {e}",
            document.id
        )))
    })?;
    Ok(Requisition::from_record(record, document.revision))
}

/// Application service for requisitions.
///
/// # Example
///
/// ```no_run
/// use requisitions::service::RequisitionService;
/// use requisitions::types::UserId;
/// use requisitions::validation::NewRequisition;
/// use stores_core::environment::SystemClock;
/// use stores_testing::InMemoryDocumentStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), requisitions::service::ServiceError> {
/// let service = RequisitionService::new(Arc::new(InMemoryDocumentStore::new()), Arc::new(SystemClock));
///
/// let created = service
///     .create(NewRequisition {
///         requestee: Some("alice".to_string()),
///         ..NewRequisition::default()
///     })
///     .await?;
///
/// let id = created.requisition.id().clone();
/// service.submit(&id, UserId::new("alice"), None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RequisitionService {
    store: Arc<dyn DocumentStore>,
    env: RequisitionEnvironment,
    reducer: RequisitionReducer,
}

impl RequisitionService {
    /// Creates a service over `store`, stamping times from `clock`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            env: RequisitionEnvironment::new(clock),
            reducer: RequisitionReducer::new(),
        }
    }

    /// Builds and stores a new requisition.
    ///
    /// # Errors
    ///
    /// - `Validation` when the requestee is missing or the items are unreadable
    /// - `AlreadyExists` when the id is taken
    /// - `Store` when the store fails
    #[tracing::instrument(skip_all, fields(requestee = ?input.requestee))]
    pub async fn create(&self, input: NewRequisition) -> Result<Created, ServiceError> {
        let Built {
            mut requisition,
            rejected,
        } = build_requisition(input, self.env.clock.as_ref())?;

        let body = encode(&requisition)?;
        let revision = self.store.insert(COLLECTION, requisition.id().into(), body).await?;
        requisition.set_revision(revision);

        metrics::counter!("requisitions.created").increment(1);
        if rejected.is_empty() {
            tracing::info!(requisition_id = %requisition.id(), items = requisition.items().len(), "Requisition created");
        } else {
            metrics::counter!("requisitions.rejected_items").increment(rejected.len() as u64);
            tracing::warn!(
                requisition_id = %requisition.id(),
                items = requisition.items().len(),
                rejected = rejected.len(),
                "Requisition created with rejected items"
            );
        }

        Ok(Created {
            requisition,
            rejected_items: rejected,
        })
    }

    /// Loads a requisition by id.
    ///
    /// # Errors
    ///
    /// - `NotFound` when no requisition has this id
    /// - `Store` when the store fails or the document is unreadable
    pub async fn get(&self, id: &RequisitionId) -> Result<Requisition, ServiceError> {
        let document = self
            .store
            .find_one(COLLECTION, Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        decode(document)
    }

    /// Lists requisitions matching `query`, ordered by id.
    ///
    /// # Errors
    ///
    /// `Store` when the store fails or a document is unreadable.
    #[tracing::instrument(skip(self))]
    pub async fn find(&self, query: RequisitionQuery) -> Result<Vec<Requisition>, ServiceError> {
        let documents = self.store.find_many(COLLECTION, query.to_filter()).await?;
        documents.into_iter().map(decode).collect()
    }

    /// Deletes a requisition (administrative; not a lifecycle step).
    ///
    /// # Errors
    ///
    /// - `NotFound` when no requisition has this id
    /// - `Store` when the store fails
    #[tracing::instrument(skip_all, fields(requisition_id = %id))]
    pub async fn delete(&self, id: &RequisitionId) -> Result<(), ServiceError> {
        if !self.store.delete_one(COLLECTION, Filter::by_id(id)).await? {
            return Err(ServiceError::NotFound(id.clone()));
        }
        tracing::info!("Requisition deleted");
        Ok(())
    }

    /// Replaces the awaiting items.
    ///
    /// Invalid items are dropped and reported, as on creation.
    ///
    /// # Errors
    ///
    /// - `Validation` when the items are unreadable or none of them is valid
    /// - `NotFound`, `Conflict`, `Lifecycle`, `Store` as for any transition
    #[tracing::instrument(skip_all, fields(requisition_id = %id, actor = %actor))]
    pub async fn replace_items(
        &self,
        id: &RequisitionId,
        items: ItemsField,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<ItemsUpdated, ServiceError> {
        require_actor(&actor)?;
        let CheckedItems { accepted, rejected } = check_items(items.into_entries()?);
        if accepted.is_empty() {
            return Err(ValidationError::AllItemsRejected { rejected }.into());
        }
        if !rejected.is_empty() {
            metrics::counter!("requisitions.rejected_items").increment(rejected.len() as u64);
        }

        let Transitioned { requisition, .. } = self
            .dispatch(id, RequisitionAction::ReplaceItems { items: accepted, actor }, expected)
            .await?;

        Ok(ItemsUpdated {
            requisition,
            rejected_items: rejected,
        })
    }

    /// Submits for approval; `actor` becomes the requestee.
    ///
    /// # Errors
    ///
    /// See [`RequisitionService::dispatch`].
    pub async fn submit(
        &self,
        id: &RequisitionId,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::Submit { actor }, expected).await
    }

    /// Approves.
    ///
    /// # Errors
    ///
    /// See [`RequisitionService::dispatch`].
    pub async fn approve(
        &self,
        id: &RequisitionId,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::Approve { actor }, expected).await
    }

    /// Declines.
    ///
    /// # Errors
    ///
    /// See [`RequisitionService::dispatch`].
    pub async fn decline(
        &self,
        id: &RequisitionId,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::Decline { actor }, expected).await
    }

    /// Hands over to purchasing.
    ///
    /// # Errors
    ///
    /// See [`RequisitionService::dispatch`].
    pub async fn await_purchase(
        &self,
        id: &RequisitionId,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::AwaitPurchase { actor }, expected).await
    }

    /// Records that the order was placed.
    ///
    /// # Errors
    ///
    /// See [`RequisitionService::dispatch`].
    pub async fn mark_ordered(
        &self,
        id: &RequisitionId,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::MarkOrdered { actor }, expected).await
    }

    /// Books in a receipt.
    ///
    /// # Errors
    ///
    /// `Lifecycle` on over-receipt, otherwise see [`RequisitionService::dispatch`].
    pub async fn receive_item(
        &self,
        id: &RequisitionId,
        line: ReceivedLine,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::ReceiveItem { line, actor }, expected).await
    }

    /// Completes.
    ///
    /// # Errors
    ///
    /// See [`RequisitionService::dispatch`].
    pub async fn complete(
        &self,
        id: &RequisitionId,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::Complete { actor }, expected).await
    }

    /// Sets the status from free text; unknown values become `NONE`.
    ///
    /// # Errors
    ///
    /// See [`RequisitionService::dispatch`].
    pub async fn set_status(
        &self,
        id: &RequisitionId,
        raw: String,
        actor: UserId,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        self.dispatch(id, RequisitionAction::SetStatus { raw, actor }, expected).await
    }

    /// Loads, reduces and saves.
    ///
    /// When `expected` is given it must equal the stored revision. An action
    /// that changes nothing (an unmatched receipt) is not written.
    ///
    /// # Errors
    ///
    /// - `Validation` when the actor is blank
    /// - `NotFound` when no requisition has this id
    /// - `Conflict` when `expected` is stale or another writer saved first
    /// - `Lifecycle` when the reducer refuses the action
    /// - `Store` when the store fails
    #[tracing::instrument(skip_all, fields(requisition_id = %id, action = action.name(), actor = %action.actor()))]
    pub async fn dispatch(
        &self,
        id: &RequisitionId,
        action: RequisitionAction,
        expected: Option<Revision>,
    ) -> Result<Transitioned, ServiceError> {
        require_actor(action.actor())?;
        let action_name = action.name();
        let mut requisition = self.get(id).await?;
        let loaded = requisition.revision();

        if let Some(expected) = expected.filter(|expected| *expected != loaded) {
            metrics::counter!("requisitions.conflicts").increment(1);
            tracing::warn!(expected = %expected, actual = %loaded, "Stale revision supplied");
            return Err(ServiceError::Conflict {
                id: id.clone(),
                expected,
                actual: loaded,
            });
        }

        let before = requisition.clone();
        let events = self.reducer.reduce(&mut requisition, action, &self.env)?;

        if requisition != before {
            let revision = self
                .store
                .update_one(COLLECTION, id.into(), loaded, encode(&requisition)?)
                .await?;
            requisition.set_revision(revision);
        }

        metrics::counter!("requisitions.transitions", "action" => action_name).increment(1);
        tracing::info!(
            status = %requisition.status(),
            department = %requisition.department(),
            revision = %requisition.revision(),
            "Requisition transitioned"
        );

        Ok(Transitioned {
            requisition,
            events: events.into_vec(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ComponentId, Quantity};
    use serde_json::json;
    use stores_testing::{test_clock, InMemoryDocumentStore};

    fn service() -> (Arc<InMemoryDocumentStore>, RequisitionService) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = RequisitionService::new(store.clone(), Arc::new(test_clock()));
        (store, service)
    }

    fn new_requisition(id: &str, items: Value) -> NewRequisition {
        NewRequisition {
            id: Some(id.to_string()),
            requestee: Some("alice".to_string()),
            is_stock_item: false,
            items: Some(ItemsField::List(items.as_array().cloned().unwrap_or_default())),
        }
    }

    fn user(name: &str) -> UserId {
        UserId::new(name)
    }

    #[tokio::test]
    async fn create_stores_document_with_derived_department() {
        let (store, service) = service();
        let created = service
            .create(new_requisition("req-1", json!([{ "id": "C1", "quantity": 2 }])))
            .await
            .unwrap();

        assert_eq!(created.requisition.revision(), Revision::new(1));
        assert!(created.rejected_items.is_empty());

        let stored = store
            .find_one(COLLECTION, Filter::by_id("req-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body["department"], "NONE");
        assert_eq!(stored.body["items"][0]["quantity"], 2);
    }

    #[tokio::test]
    async fn create_with_missing_requestee_touches_nothing() {
        let (store, service) = service();
        let result = service
            .create(NewRequisition {
                id: Some("req-1".to_string()),
                ..NewRequisition::default()
            })
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Validation(ValidationError::MissingField("requestee")))
        ));
        assert_eq!(store.count(COLLECTION).await, 0);
    }

    #[tokio::test]
    async fn duplicate_id_is_reported() {
        let (_, service) = service();
        service.create(new_requisition("req-1", json!([]))).await.unwrap();
        let again = service.create(new_requisition("req-1", json!([]))).await;
        assert!(matches!(again, Err(ServiceError::AlreadyExists(id)) if id.as_str() == "req-1"));
    }

    #[tokio::test]
    async fn transitions_bump_revision() {
        let (_, service) = service();
        service.create(new_requisition("req-1", json!([]))).await.unwrap();
        let id = RequisitionId::new("req-1");

        let submitted = service.submit(&id, user("alice"), None).await.unwrap();
        assert_eq!(submitted.requisition.revision(), Revision::new(2));
        assert_eq!(submitted.requisition.department(), Department::Engineering);

        let approved = service.approve(&id, user("bob"), Some(Revision::new(2))).await.unwrap();
        assert_eq!(approved.requisition.revision(), Revision::new(3));
        assert_eq!(service.get(&id).await.unwrap(), approved.requisition);
    }

    #[tokio::test]
    async fn stale_expected_revision_is_a_conflict() {
        let (_, service) = service();
        service.create(new_requisition("req-1", json!([]))).await.unwrap();
        let id = RequisitionId::new("req-1");
        service.submit(&id, user("alice"), None).await.unwrap();

        let result = service.approve(&id, user("bob"), Some(Revision::new(1))).await;
        assert!(matches!(
            result,
            Err(ServiceError::Conflict { expected, actual, .. })
                if expected == Revision::new(1) && actual == Revision::new(2)
        ));
        assert_eq!(service.get(&id).await.unwrap().status(), Status::AwaitingApproval);
    }

    #[tokio::test]
    async fn lost_update_is_detected_by_the_store() {
        let (store, service) = service();
        service.create(new_requisition("req-1", json!([]))).await.unwrap();
        let id = RequisitionId::new("req-1");

        // We read at revision 1, then another writer saves first
        let stale = service.get(&id).await.unwrap();
        service.submit(&id, user("carol"), None).await.unwrap();

        let result = store
            .update_one(COLLECTION, stale.id().into(), stale.revision(), encode(&stale).unwrap())
            .await
            .map_err(ServiceError::from);

        assert!(matches!(
            result,
            Err(ServiceError::Conflict { expected, actual, .. })
                if expected == Revision::new(1) && actual == Revision::new(2)
        ));
    }

    #[tokio::test]
    async fn unknown_requisition_is_not_found() {
        let (_, service) = service();
        let id = RequisitionId::new("ghost");

        assert!(matches!(service.get(&id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(
            service.approve(&id, user("bob"), None).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(service.delete(&id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn blank_actor_is_refused_before_loading() {
        let (_, service) = service();
        service
            .create(new_requisition("req-1", json!([{ "id": "C1", "quantity": 2 }])))
            .await
            .unwrap();
        let id = RequisitionId::new("req-1");

        let approved = service.approve(&id, user("  "), None).await;
        assert!(matches!(
            approved,
            Err(ServiceError::Validation(ValidationError::MissingField("user")))
        ));

        let replaced = service
            .replace_items(&id, ItemsField::List(vec![json!({ "id": "C2", "quantity": 1 })]), user(""), None)
            .await;
        assert!(matches!(
            replaced,
            Err(ServiceError::Validation(ValidationError::MissingField("user")))
        ));

        // Validation comes first, even for a requisition that does not exist
        let ghost = service.submit(&RequisitionId::new("ghost"), user(""), None).await;
        assert!(matches!(ghost, Err(ServiceError::Validation(_))));

        let stored = service.get(&id).await.unwrap();
        assert_eq!(stored.revision(), Revision::new(1));
        assert_eq!(stored.approved_by(), None);
        assert_eq!(stored.last_updated_by(), &user("alice"));
    }

    #[tokio::test]
    async fn over_receipt_is_not_persisted() {
        let (_, service) = service();
        service
            .create(new_requisition("req-1", json!([{ "id": "C1", "quantity": 2 }])))
            .await
            .unwrap();
        let id = RequisitionId::new("req-1");

        let result = service
            .receive_item(
                &id,
                ReceivedLine::new(ComponentId::new("C1"), Quantity::new(3).unwrap()),
                user("wes"),
                None,
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Lifecycle(LifecycleError::OverReceipt { .. }))));
        let stored = service.get(&id).await.unwrap();
        assert_eq!(stored.revision(), Revision::new(1));
        assert_eq!(stored.items().total_quantity(), 2);
    }

    #[tokio::test]
    async fn unmatched_receipt_does_not_write() {
        let (_, service) = service();
        service
            .create(new_requisition("req-1", json!([{ "id": "C1", "quantity": 2 }])))
            .await
            .unwrap();
        let id = RequisitionId::new("req-1");

        let outcome = service
            .receive_item(&id, ReceivedLine::new(ComponentId::new("C9"), Quantity::ONE), user("wes"), None)
            .await
            .unwrap();

        assert_eq!(outcome.requisition.revision(), Revision::new(1));
        assert_eq!(outcome.events.len(), 1);
    }

    #[tokio::test]
    async fn replace_items_reports_rejections() {
        let (_, service) = service();
        service
            .create(new_requisition("req-1", json!([{ "id": "C1", "quantity": 2 }])))
            .await
            .unwrap();
        let id = RequisitionId::new("req-1");

        let updated = service
            .replace_items(
                &id,
                ItemsField::List(vec![json!({ "id": "C2", "quantity": 1 }), json!({ "id": "C3" })]),
                user("alice"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.rejected_items.len(), 1);
        assert!(updated.requisition.items().get(&ComponentId::new("C1")).is_none());
        assert_eq!(updated.requisition.items().len(), 1);

        let all_bad = service
            .replace_items(&id, ItemsField::List(vec![json!({ "quantity": 1 })]), user("alice"), None)
            .await;
        assert!(matches!(
            all_bad,
            Err(ServiceError::Validation(ValidationError::AllItemsRejected { .. }))
        ));
    }

    #[tokio::test]
    async fn find_filters_on_stored_fields() {
        let (_, service) = service();
        for id in ["req-1", "req-2", "req-3"] {
            service.create(new_requisition(id, json!([]))).await.unwrap();
        }
        service
            .approve(&RequisitionId::new("req-2"), user("bob"), None)
            .await
            .unwrap();

        let purchasing = service
            .find(RequisitionQuery::by_department(Department::Purchasing))
            .await
            .unwrap();
        assert_eq!(purchasing.len(), 1);
        assert_eq!(purchasing[0].id().as_str(), "req-2");

        let by_approver = service
            .find(RequisitionQuery {
                approved_by: Some(user("bob")),
                completed: Some(false),
                ..RequisitionQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_approver.len(), 1);

        let approved_at = service.get(&RequisitionId::new("req-2")).await.unwrap().date_approved();
        let by_approval_date = service
            .find(RequisitionQuery {
                date_approved: approved_at,
                ..RequisitionQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_approval_date.len(), 1);
        assert_eq!(by_approval_date[0].id().as_str(), "req-2");

        let all = service.find(RequisitionQuery::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, ["req-1", "req-2", "req-3"]);
    }

    #[test]
    fn query_to_filter_uses_document_field_names() {
        let query = RequisitionQuery {
            status: Some(Status::Ordered),
            ordered_by: Some(user("bob")),
            ..RequisitionQuery::default()
        };
        assert_eq!(
            query.to_filter().to_json(),
            json!({ "orderedBy": "bob", "status": "ORDERED" })
        );
    }

    #[test]
    fn date_filters_match_the_stored_format() {
        let at = test_clock().now();
        let query = RequisitionQuery {
            last_updated: Some(at),
            ..RequisitionQuery::default()
        };
        let record = Requisition::new(RequisitionId::new("req-1"), user("alice"), false, at).to_record();

        assert_eq!(
            query.to_filter().to_json(),
            json!({ "lastUpdated": serde_json::to_value(record).unwrap()["lastUpdated"] })
        );
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let (store, service) = service();
        service.create(new_requisition("req-1", json!([]))).await.unwrap();
        service.delete(&RequisitionId::new("req-1")).await.unwrap();
        assert_eq!(store.count(COLLECTION).await, 0);
    }
}
