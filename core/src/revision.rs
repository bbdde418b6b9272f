//! Document identification and revision types.
//!
//! This module defines strong types for document identification (`DocumentId`)
//! and optimistic concurrency control (`Revision`) used by every document store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `DocumentId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid document ID: {0}")]
pub struct ParseDocumentIdError(String);

/// Unique identifier for a document within a collection.
///
/// # Validation
///
/// - `FromStr::from_str()`: Validates input (rejects empty or blank strings)
/// - `From::from()` and `new()`: No validation (for trusted, application-built ids)
///
/// # Examples
///
/// ```
/// use stores_core::revision::DocumentId;
///
/// let id = DocumentId::new("req-12345");
/// assert_eq!(id.as_str(), "req-12345");
///
/// let parsed: DocumentId = "req-abc".parse().unwrap();
/// assert_eq!(parsed, DocumentId::new("req-abc"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new `DocumentId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the document ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `DocumentId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = ParseDocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseDocumentIdError(
                "Document ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Document revision number for optimistic concurrency control.
///
/// A document that does not exist yet is at [`Revision::INITIAL`]. Inserting
/// it produces revision 1 and every successful update increments by one:
///
/// - When updating, the caller states the revision it read
/// - If the stored revision has moved on, the update is rejected
/// - This prevents lost updates when two writers race on the same document
///
/// # Examples
///
/// ```
/// use stores_core::revision::Revision;
///
/// let r0 = Revision::INITIAL;
/// let r1 = r0.next();
/// assert_eq!(r1, Revision::new(1));
/// assert_eq!(r1.value(), 1);
/// ```
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// The revision of a document that has never been written.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Revision` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the revision number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next revision (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Check if this is the initial revision (0).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Revision> for u64 {
    fn from(revision: Revision) -> Self {
        revision.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod document_id_tests {
        use super::*;

        #[test]
        fn new_creates_document_id() {
            let id = DocumentId::new("req-123");
            assert_eq!(id.as_str(), "req-123");
        }

        #[test]
        #[allow(clippy::expect_used)] // Panics: Test will fail if parse fails
        fn parse_from_str() {
            let id: DocumentId = "req-123".parse().expect("parse should succeed");
            assert_eq!(id, DocumentId::new("req-123"));
        }

        #[test]
        fn parse_blank_string_fails() {
            assert!("".parse::<DocumentId>().is_err());
            assert!("   ".parse::<DocumentId>().is_err());
        }

        #[test]
        fn into_inner() {
            let id = DocumentId::new("req-123");
            assert_eq!(id.into_inner(), "req-123");
        }
    }

    mod revision_tests {
        use super::*;

        #[test]
        fn initial_revision() {
            assert_eq!(Revision::INITIAL, Revision::new(0));
            assert!(Revision::INITIAL.is_initial());
            assert!(!Revision::new(1).is_initial());
        }

        #[test]
        fn next_revision() {
            assert_eq!(Revision::INITIAL.next().next(), Revision::new(2));
        }

        #[test]
        fn revision_ordering() {
            assert!(Revision::new(1) < Revision::new(2));
        }

        #[test]
        #[allow(clippy::unwrap_used)]
        fn serializes_as_plain_number() {
            let json = serde_json::to_string(&Revision::new(7)).unwrap();
            assert_eq!(json, "7");
        }
    }
}
