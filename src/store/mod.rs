//! Persistence layer: a JSON document store with libSQL and in-memory backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

use serde::Serialize;
use serde_json::Value;

use crate::error::DatabaseError;
use crate::model::{Record, Stored};

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::{Document, DocumentStore, Filter, ID_FIELD};

/// Serialize a value into a top-level JSON object.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Document, DatabaseError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Insert a typed record into its collection.
pub async fn insert_record<T: Record>(
    store: &dyn DocumentStore,
    record: &T,
) -> Result<String, DatabaseError> {
    store.insert(T::COLLECTION, to_document(record)?).await
}

/// All records of type `T` matching `filter`.
pub async fn find_records<T: Record>(
    store: &dyn DocumentStore,
    filter: &Filter,
) -> Result<Vec<Stored<T>>, DatabaseError> {
    store
        .find_many(T::COLLECTION, filter)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(Value::Object(doc)).map_err(DatabaseError::from))
        .collect()
}

/// First record of type `T` matching `filter`.
pub async fn find_record<T: Record>(
    store: &dyn DocumentStore,
    filter: &Filter,
) -> Result<Option<Stored<T>>, DatabaseError> {
    match store.find_one(T::COLLECTION, filter).await? {
        Some(doc) => Ok(Some(serde_json::from_value(Value::Object(doc))?)),
        None => Ok(None),
    }
}

/// Overwrite an existing record, keeping its id.
pub async fn replace_record<T: Record>(
    store: &dyn DocumentStore,
    id: &str,
    record: &T,
) -> Result<(), DatabaseError> {
    store.replace(T::COLLECTION, id, to_document(record)?).await
}
