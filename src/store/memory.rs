//! In-process `DocumentStore` used by tests and local experiments.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::{Document, DocumentStore, Filter, ID_FIELD};
use crate::error::DatabaseError;

/// Collections held in memory, each a vector in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, simulating a lost connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), DatabaseError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DatabaseError::Pool("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn insert(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<String, DatabaseError> {
        self.check_online()?;
        let id = Uuid::new_v4().to_string();
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(id)
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DatabaseError> {
        self.check_online()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        mut document: Document,
    ) -> Result<(), DatabaseError> {
        self.check_online()?;
        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.get(ID_FIELD) == Some(&Value::from(id))))
            .ok_or_else(|| DatabaseError::NotFound {
                entity: collection.to_string(),
                id: id.to_string(),
            })?;
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        *slot = document;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, DatabaseError> {
        self.check_online()?;
        let collections = self.collections.read().await;
        Ok(collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }
}
