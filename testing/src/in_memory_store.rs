//! In-memory `DocumentStore` for tests.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use stores_core::document::{Document, Filter};
use stores_core::document_store::{DocumentStore, DocumentStoreError, StoreFuture};
use stores_core::revision::{DocumentId, Revision};
use tokio::sync::RwLock;

type Collection = BTreeMap<DocumentId, Document>;

/// In-memory document store.
///
/// Collections are created on first write. Documents are kept ordered by id
/// so `find_one`/`find_many` behave like the Postgres store's `ORDER BY id`.
///
/// # Example
///
/// ```no_run
/// use serde_json::json;
/// use stores_core::document::Filter;
/// use stores_core::document_store::{DocumentStore, DocumentStoreError};
/// use stores_core::revision::{DocumentId, Revision};
/// use stores_testing::InMemoryDocumentStore;
///
/// async fn example() -> Result<(), DocumentStoreError> {
///     let store = InMemoryDocumentStore::new();
///     let id = DocumentId::new("req-1");
///
///     let revision = store.insert("requisitions", id, json!({ "n": 1 })).await?;
///     assert_eq!(revision, Revision::new(1));
///
///     let found = store.find_one("requisitions", Filter::by_id("req-1")).await?;
///     assert!(found.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Filter,
    ) -> StoreFuture<'a, Option<Document>> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            Ok(collections.get(collection).and_then(|docs| {
                docs.values()
                    .find(|document| filter.matches(document))
                    .cloned()
            }))
        })
    }

    fn find_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Filter,
    ) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            Ok(collections.get(collection).map_or_else(Vec::new, |docs| {
                docs.values()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            }))
        })
    }

    fn insert<'a>(
        &'a self,
        collection: &'a str,
        id: DocumentId,
        body: Value,
    ) -> StoreFuture<'a, Revision> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection.to_string()).or_default();

            if docs.contains_key(&id) {
                return Err(DocumentStoreError::AlreadyExists {
                    collection: collection.to_string(),
                    id,
                });
            }

            let revision = Revision::INITIAL.next();
            docs.insert(id.clone(), Document::new(id, revision, body));
            Ok(revision)
        })
    }

    fn update_one<'a>(
        &'a self,
        collection: &'a str,
        id: DocumentId,
        expected: Revision,
        body: Value,
    ) -> StoreFuture<'a, Revision> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let Some(document) = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(&id))
            else {
                return Err(DocumentStoreError::NotFound {
                    collection: collection.to_string(),
                    id,
                });
            };

            if document.revision != expected {
                return Err(DocumentStoreError::ConcurrencyConflict {
                    id,
                    expected,
                    actual: document.revision,
                });
            }

            document.revision = expected.next();
            document.body = body;
            Ok(document.revision)
        })
    }

    fn delete_one<'a>(&'a self, collection: &'a str, filter: Filter) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let Some(docs) = collections.get_mut(collection) else {
                return Ok(false);
            };

            let target = docs
                .values()
                .find(|document| filter.matches(document))
                .map(|document| document.id.clone());

            Ok(target.is_some_and(|id| docs.remove(&id).is_some()))
        })
    }
}
