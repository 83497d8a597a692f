use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, Query, Store, UpdateError, UpdateOp, apply_all};

type Documents = Vec<(String, Value)>;

/// A memory-based store. Documents keep their insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    db: Arc<RwLock<HashMap<Collection, Documents>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: Collection) -> usize {
        self.db
            .read()
            .await
            .get(&collection)
            .map_or(0, |docs| docs.len())
    }
}

#[derive(Debug)]
pub enum MemStoreError {
    Duplicate(String),
    Update(UpdateError),
}

impl fmt::Display for MemStoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemStoreError::Duplicate(id) => write!(f, "Document {} already exists", id),
            MemStoreError::Update(err) => write!(f, "Update rejected: {}", err),
        }
    }
}

impl std::error::Error for MemStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MemStoreError::Update(err) => Some(err),
            MemStoreError::Duplicate(_) => None,
        }
    }
}

impl From<UpdateError> for MemStoreError {
    fn from(err: UpdateError) -> MemStoreError {
        MemStoreError::Update(err)
    }
}

#[async_trait]
impl Store for MemStore {
    type Error = MemStoreError;

    async fn find(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, Self::Error> {
        let db = self.db.read().await;
        let docs = db.get(&collection).map(|docs| docs.as_slice()).unwrap_or_default();

        Ok(query.run(docs.iter().cloned()))
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
    ) -> Result<(), Self::Error> {
        let mut db = self.db.write().await;
        let docs = db.entry(collection).or_default();

        if docs.iter().any(|(key, _)| key == id) {
            return Err(MemStoreError::Duplicate(id.to_string()));
        }

        docs.push((id.to_string(), doc));
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        ops: &[UpdateOp],
    ) -> Result<bool, Self::Error> {
        let mut db = self.db.write().await;
        let Some((_, doc)) = db
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|(key, _)| key == id))
        else {
            return Ok(false);
        };

        // Apply to a copy so a rejected operator leaves the document untouched
        let mut updated = doc.clone();
        apply_all(&mut updated, ops)?;
        *doc = updated;

        Ok(true)
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<bool, Self::Error> {
        let mut db = self.db.write().await;
        let Some(docs) = db.get_mut(&collection) else {
            return Ok(false);
        };

        match docs.iter().position(|(key, _)| key == id) {
            Some(pos) => {
                docs.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
