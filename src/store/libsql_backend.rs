//! libSQL backend for `DocumentStore`.
//!
//! All collections share one `documents` table. Bodies are stored as JSON
//! text and filtered with `json_extract`. Insertion order is the `seq`
//! autoincrement column.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::migrations;
use super::traits::{Document, DocumentStore, Filter, ID_FIELD};
use crate::error::DatabaseError;

/// libSQL document store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open the database named by a `DATABASE_URL` value.
    ///
    /// `:memory:` opens a private in-memory database; anything else is a
    /// local file path.
    pub async fn open(url: &str) -> Result<Self, DatabaseError> {
        if url == ":memory:" {
            Self::new_memory().await
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Self::new_local(Path::new(path)).await
        }
    }

    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// JSON path for a top-level field, quoted so any key is addressable.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

/// Build the `WHERE` clause and positional parameters for a filter.
fn where_clause(collection: &str, filter: &Filter) -> (String, Vec<libsql::Value>) {
    let mut sql = String::from("collection = ?1");
    let mut values = vec![libsql::Value::Text(collection.to_string())];

    for (field, expected) in filter.clauses() {
        if field == ID_FIELD {
            values.push(libsql::Value::Text(expected.clone()));
            sql.push_str(&format!(" AND id = ?{}", values.len()));
        } else {
            values.push(libsql::Value::Text(json_path(field)));
            let path_idx = values.len();
            values.push(libsql::Value::Text(expected.clone()));
            sql.push_str(&format!(
                " AND json_extract(body, ?{path_idx}) = ?{}",
                values.len()
            ));
        }
    }
    (sql, values)
}

/// Map an `(id, body)` row to a document carrying its `_id`.
fn row_to_document(row: &libsql::Row) -> Result<Document, DatabaseError> {
    let id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
    let body: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
    let mut doc = match serde_json::from_str::<Value>(&body)? {
        Value::Object(map) => map,
        other => {
            return Err(DatabaseError::Serialization(format!(
                "document {id} is not an object: {other}"
            )));
        }
    };
    doc.insert(ID_FIELD.to_string(), Value::String(id));
    Ok(doc)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl DocumentStore for LibSqlStore {
    fn backend_name(&self) -> &str {
        "libsql"
    }

    async fn insert(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<String, DatabaseError> {
        document.remove(ID_FIELD);
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(&document)?;

        self.conn()
            .execute(
                "INSERT INTO documents (id, collection, body) VALUES (?1, ?2, ?3)",
                params![id.clone(), collection, body],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert into {collection}: {e}")))?;

        debug!(id = %id, collection, "Document inserted");
        Ok(id)
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DatabaseError> {
        let (clause, values) = where_clause(collection, filter);
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT id, body FROM documents WHERE {clause} ORDER BY seq ASC"),
                values,
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find in {collection}: {e}")))?;

        let mut docs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("find in {collection}: {e}")))?
        {
            docs.push(row_to_document(&row)?);
        }
        Ok(docs)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DatabaseError> {
        let (clause, values) = where_clause(collection, filter);
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT id, body FROM documents WHERE {clause} ORDER BY seq ASC LIMIT 1"),
                values,
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_one in {collection}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_one in {collection}: {e}"))),
        }
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DatabaseError> {
        let (clause, values) = where_clause(collection, filter);
        let mut rows = self
            .conn()
            .query(&format!("SELECT COUNT(*) FROM documents WHERE {clause}"), values)
            .await
            .map_err(|e| DatabaseError::Query(format!("count in {collection}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count row parse: {e}")))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count in {collection}: {e}"))),
        }
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        mut document: Document,
    ) -> Result<(), DatabaseError> {
        document.remove(ID_FIELD);
        let body = serde_json::to_string(&document)?;
        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn()
            .execute(
                "UPDATE documents SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
                params![body, now, collection, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("replace in {collection}: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: collection.to_string(),
                id: id.to_string(),
            });
        }
        debug!(id, collection, "Document replaced");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT DISTINCT collection FROM documents ORDER BY collection ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_collections: {e}")))?;

        let mut names = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_collections: {e}")))?
        {
            let name: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_collections row parse: {e}")))?;
            names.push(name);
        }
        Ok(names)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.conn()
            .query("SELECT 1", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("ping failed: {e}")))?;
        Ok(())
    }
}
