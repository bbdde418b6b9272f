//! `PostgreSQL` document store for the stores services.
//!
//! This crate provides a PostgreSQL-backed implementation of the
//! `DocumentStore` trait from `stores-core`. Every collection lives in a
//! single `documents` table:
//!
//! ```text
//! documents(collection TEXT, id TEXT, revision BIGINT, body JSONB, ...)
//!           PRIMARY KEY (collection, id)
//! ```
//!
//! Filters are evaluated with JSONB containment (`body @> $filter`), and
//! updates only apply when the stored revision still equals the revision
//! the caller read.
//!
//! # Example
//!
//! ```no_run
//! use stores_postgres::PostgresDocumentStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresDocumentStore::new("postgres://localhost/stores", 5).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use stores_core::document::{Document, Filter};
use stores_core::document_store::{DocumentStore, DocumentStoreError, StoreFuture};
use stores_core::revision::{DocumentId, Revision};

type DocumentRow = (String, i64, Value);

/// `PostgreSQL`-based document store.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Connects to `database_url` with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DatabaseError`] if the pool cannot connect.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, DocumentStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DocumentStoreError::DatabaseError(e.to_string()))?;

        tracing::info!(max_connections, "Connected to PostgreSQL document store");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `documents` table and its indexes if they are missing.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DatabaseError`] if a statement fails.
    pub async fn migrate(&self) -> Result<(), DocumentStoreError> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                revision BIGINT NOT NULL,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_documents_body ON documents USING GIN (body jsonb_path_ops)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DocumentStoreError::DatabaseError(e.to_string()))?;
        }

        tracing::debug!("Document store schema is up to date");
        Ok(())
    }

    async fn current_revision(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Revision>, DocumentStoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT revision FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DocumentStoreError::DatabaseError(e.to_string()))?;

        row.map(|(revision,)| revision_from_db(revision)).transpose()
    }
}

fn revision_from_db(value: i64) -> Result<Revision, DocumentStoreError> {
    u64::try_from(value)
        .map(Revision::new)
        .map_err(|_| DocumentStoreError::DatabaseError(format!("Negative revision in database: {value}")))
}

fn revision_to_db(revision: Revision) -> Result<i64, DocumentStoreError> {
    i64::try_from(revision.value()).map_err(|_| {
        DocumentStoreError::DatabaseError(format!("Revision {revision} does not fit in BIGINT"))
    })
}

fn document_from_row((id, revision, body): DocumentRow) -> Result<Document, DocumentStoreError> {
    Ok(Document::new(DocumentId::new(id), revision_from_db(revision)?, body))
}

impl DocumentStore for PostgresDocumentStore {
    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Filter,
    ) -> StoreFuture<'a, Option<Document>> {
        Box::pin(async move {
            let row: Option<DocumentRow> = sqlx::query_as(
                r"
                SELECT id, revision, body FROM documents
                WHERE collection = $1
                  AND ($2::TEXT IS NULL OR id = $2)
                  AND body @> $3
                ORDER BY id
                LIMIT 1
                ",
            )
            .bind(collection)
            .bind(filter.id().map(DocumentId::as_str))
            .bind(filter.to_json())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DocumentStoreError::DatabaseError(e.to_string()))?;

            row.map(document_from_row).transpose()
        })
    }

    fn find_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Filter,
    ) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move {
            let rows: Vec<DocumentRow> = sqlx::query_as(
                r"
                SELECT id, revision, body FROM documents
                WHERE collection = $1
                  AND ($2::TEXT IS NULL OR id = $2)
                  AND body @> $3
                ORDER BY id
                ",
            )
            .bind(collection)
            .bind(filter.id().map(DocumentId::as_str))
            .bind(filter.to_json())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DocumentStoreError::DatabaseError(e.to_string()))?;

            rows.into_iter().map(document_from_row).collect()
        })
    }

    fn insert<'a>(
        &'a self,
        collection: &'a str,
        id: DocumentId,
        body: Value,
    ) -> StoreFuture<'a, Revision> {
        Box::pin(async move {
            let revision = Revision::INITIAL.next();

            let result = sqlx::query(
                "INSERT INTO documents (collection, id, revision, body) VALUES ($1, $2, $3, $4)",
            )
            .bind(collection)
            .bind(id.as_str())
            .bind(revision_to_db(revision)?)
            .bind(&body)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(revision),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    Err(DocumentStoreError::AlreadyExists {
                        collection: collection.to_string(),
                        id,
                    })
                },
                Err(e) => Err(DocumentStoreError::DatabaseError(e.to_string())),
            }
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
            let updated: Option<(i64,)> = sqlx::query_as(
                r"
                UPDATE documents
                SET body = $4, revision = revision + 1, updated_at = now()
                WHERE collection = $1 AND id = $2 AND revision = $3
                RETURNING revision
                ",
            )
            .bind(collection)
            .bind(id.as_str())
            .bind(revision_to_db(expected)?)
            .bind(&body)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DocumentStoreError::DatabaseError(e.to_string()))?;

            if let Some((revision,)) = updated {
                return revision_from_db(revision);
            }

            // Nothing matched: either the document is gone or someone else wrote first
            match self.current_revision(collection, &id).await? {
                None => Err(DocumentStoreError::NotFound {
                    collection: collection.to_string(),
                    id,
                }),
                Some(actual) => {
                    tracing::warn!(
                        collection,
                        id = %id,
                        expected = %expected,
                        actual = %actual,
                        "Revision check failed"
                    );
                    metrics::counter!("document_store.conflicts", "collection" => collection.to_string())
                        .increment(1);
                    Err(DocumentStoreError::ConcurrencyConflict { id, expected, actual })
                },
            }
        })
    }

    fn delete_one<'a>(&'a self, collection: &'a str, filter: Filter) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                DELETE FROM documents
                WHERE collection = $1 AND id = (
                    SELECT id FROM documents
                    WHERE collection = $1
                      AND ($2::TEXT IS NULL OR id = $2)
                      AND body @> $3
                    ORDER BY id
                    LIMIT 1
                )
                ",
            )
            .bind(collection)
            .bind(filter.id().map(DocumentId::as_str))
            .bind(filter.to_json())
            .execute(&self.pool)
            .await
            .map_err(|e| DocumentStoreError::DatabaseError(e.to_string()))?;

            Ok(result.rows_affected() > 0)
        })
    }
}
