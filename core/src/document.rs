//! Documents and equality filters.
//!
//! A [`Document`] is a JSON body stored under an id inside a named
//! collection, together with its current [`Revision`]. Stores are queried
//! with a [`Filter`]: a conjunction of equality tests on the document id
//! and on top-level scalar fields of the body.

use crate::revision::{DocumentId, Revision};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Id of the document within its collection
    pub id: DocumentId,
    /// Revision of the stored body
    pub revision: Revision,
    /// JSON body
    pub body: Value,
}

impl Document {
    /// Creates a new document
    #[must_use]
    pub const fn new(id: DocumentId, revision: Revision, body: Value) -> Self {
        Self { id, revision, body }
    }
}

/// Equality filter over documents.
///
/// All clauses must hold for a document to match. An empty filter matches
/// every document in the collection.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use stores_core::document::{Document, Filter};
/// use stores_core::revision::{DocumentId, Revision};
///
/// let doc = Document::new(
///     DocumentId::new("req-1"),
///     Revision::new(1),
///     json!({ "status": "APPROVED", "requestee": "alice" }),
/// );
///
/// assert!(Filter::eq("status", "APPROVED").matches(&doc));
/// assert!(Filter::by_id("req-1").and("requestee", "alice").matches(&doc));
/// assert!(!Filter::eq("status", "ORDERED").matches(&doc));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    id: Option<DocumentId>,
    fields: Vec<(String, Value)>,
}

impl Filter {
    /// A filter matching every document
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching the document with the given id
    #[must_use]
    pub fn by_id(id: impl Into<DocumentId>) -> Self {
        Self {
            id: Some(id.into()),
            fields: Vec::new(),
        }
    }

    /// A filter matching documents whose `field` equals `value`
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    /// Adds another equality clause
    #[must_use]
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// The id clause, if any
    #[must_use]
    pub const fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    /// The field clauses in insertion order
    #[must_use]
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Whether the filter has no clauses at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.fields.is_empty()
    }

    /// Evaluates the filter against a document
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        if let Some(id) = &self.id {
            if *id != document.id {
                return false;
            }
        }

        self.fields
            .iter()
            .all(|(field, value)| document.body.get(field) == Some(value))
    }

    /// The field clauses as a single JSON object.
    ///
    /// Used by stores that evaluate filters through JSON containment.
    /// Later clauses on the same field override earlier ones.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self.fields.iter().cloned().collect();
        Value::Object(object)
    }
}
