//! Document store trait and related types.
//!
//! This module defines the persistence collaborator every service talks to:
//! a set of named collections holding JSON documents keyed by id, with
//! revision-checked updates.
//!
//! # Design
//!
//! The `DocumentStore` trait is deliberately minimal. It provides exactly what
//! the services need:
//!
//! - Find one or many documents by equality filter
//! - Insert a new document under a caller-chosen id
//! - Update a document, asserting the revision the caller read
//! - Delete a document by filter
//!
//! There is no built-in retry. A `ConcurrencyConflict` is returned to the
//! caller, who decides whether to reload and try again.
//!
//! # Implementations
//!
//! - `PostgresDocumentStore` (in `stores-postgres`): Production implementation
//! - `InMemoryDocumentStore` (in `stores-testing`): Fast, deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use stores_core::document::Filter;
//! use stores_core::document_store::{DocumentStore, DocumentStoreError};
//! use stores_core::revision::DocumentId;
//!
//! async fn example<S: DocumentStore>(store: &S) -> Result<(), DocumentStoreError> {
//!     let id = DocumentId::new("req-123");
//!
//!     let revision = store
//!         .insert("requisitions", id.clone(), json!({ "status": "NONE" }))
//!         .await?;
//!
//!     // Update asserting the revision we just got back
//!     store
//!         .update_one("requisitions", id.clone(), revision, json!({ "status": "APPROVED" }))
//!         .await?;
//!
//!     let approved = store
//!         .find_many("requisitions", Filter::eq("status", "APPROVED"))
//!         .await?;
//!     assert_eq!(approved.len(), 1);
//!     Ok(())
//! }
//! ```

use crate::document::{Document, Filter};
use crate::revision::{DocumentId, Revision};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`DocumentStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DocumentStoreError>> + Send + 'a>>;

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    /// No document with this id exists in the collection.
    #[error("Document not found: {collection}/{id}")]
    NotFound {
        /// Collection that was searched
        collection: String,
        /// Id that was not found
        id: DocumentId,
    },

    /// A document with this id already exists in the collection.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists {
        /// Collection written to
        collection: String,
        /// Id that is already taken
        id: DocumentId,
    },

    /// Optimistic concurrency conflict: the stored revision has moved on.
    ///
    /// Another writer updated the document between the caller's read and
    /// this write.
    #[error("Concurrency conflict on {id}: expected revision {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The document where the conflict occurred.
        id: DocumentId,
        /// The revision the caller read.
        expected: Revision,
        /// The revision currently stored.
        actual: Revision,
    },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Document store abstraction.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across request handlers.
///
/// # Dyn Compatibility
///
/// This trait uses explicit boxed futures instead of `async fn` so services
/// can hold it as `Arc<dyn DocumentStore>`.
pub trait DocumentStore: Send + Sync {
    /// Find the first document matching `filter` (lowest id first).
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn find_one<'a>(&'a self, collection: &'a str, filter: Filter)
    -> StoreFuture<'a, Option<Document>>;

    /// Find every document matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn find_many<'a>(&'a self, collection: &'a str, filter: Filter) -> StoreFuture<'a, Vec<Document>>;

    /// Insert a new document.
    ///
    /// # Returns
    ///
    /// The revision of the new document (always `Revision::new(1)`).
    ///
    /// # Errors
    ///
    /// - `AlreadyExists`: A document with `id` is already stored
    /// - `DatabaseError`: Database connection or query failed
    fn insert<'a>(&'a self, collection: &'a str, id: DocumentId, body: Value)
    -> StoreFuture<'a, Revision>;

    /// Replace the body of an existing document.
    ///
    /// The update is applied only if the stored revision equals `expected`.
    ///
    /// # Returns
    ///
    /// The new revision (`expected.next()`).
    ///
    /// # Errors
    ///
    /// - `NotFound`: No document with `id` exists
    /// - `ConcurrencyConflict`: The stored revision differs from `expected`
    /// - `DatabaseError`: Database connection or query failed
    fn update_one<'a>(
        &'a self,
        collection: &'a str,
        id: DocumentId,
        expected: Revision,
        body: Value,
    ) -> StoreFuture<'a, Revision>;

    /// Delete the first document matching `filter`.
    ///
    /// # Returns
    ///
    /// `true` if a document was removed, `false` if nothing matched.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn delete_one<'a>(&'a self, collection: &'a str, filter: Filter) -> StoreFuture<'a, bool>;
}
