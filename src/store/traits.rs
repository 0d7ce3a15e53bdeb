//! Backend-agnostic `DocumentStore` trait.
//!
//! Every collection is a list of JSON objects. The store assigns each
//! document an opaque string id, exposed as the `_id` field on reads.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::DatabaseError;

/// A stored JSON document. Reads always include `_id`.
pub type Document = Map<String, Value>;

/// Field name carrying the document id on reads and in filters.
pub const ID_FIELD: &str = "_id";

/// Conjunction of string-equality conditions on top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<(String, String)>,
}

impl Filter {
    /// Matches every document in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Add `field == value` only when a non-blank value is given.
    pub fn eq_opt(self, field: impl Into<String>, value: Option<&str>) -> Self {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    /// Shorthand for a filter on the document id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().eq(ID_FIELD, id)
    }

    pub fn clauses(&self) -> &[(String, String)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `doc` (including its `_id`) satisfies every clause.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| match doc.get(field) {
                Some(Value::String(s)) => s == expected,
                _ => false,
            })
    }
}

/// Backend-agnostic document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable backend name, used by diagnostics.
    fn backend_name(&self) -> &str;

    /// Insert a document into `collection`. Returns the generated id.
    ///
    /// A `_id` field in `document` is ignored.
    async fn insert(&self, collection: &str, document: Document) -> Result<String, DatabaseError>;

    /// All documents in `collection` matching `filter`, in insertion order.
    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DatabaseError>;

    /// First document matching `filter`, in insertion order.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DatabaseError> {
        Ok(self.find_many(collection, filter).await?.into_iter().next())
    }

    /// Number of documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DatabaseError> {
        Ok(self.find_many(collection, filter).await?.len() as u64)
    }

    /// Replace the body of an existing document, keeping its id.
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<(), DatabaseError>;

    /// Names of collections holding at least one document, sorted.
    async fn list_collections(&self) -> Result<Vec<String>, DatabaseError>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.list_collections().await.map(|_| ())
    }
}
