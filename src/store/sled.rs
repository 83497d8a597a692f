use std::{fmt, path::Path};

use async_trait::async_trait;
use serde_json::Value;

use super::{Collection, Query, Store, UpdateError, UpdateOp, apply_all};

/// A sled-backed store with one tree per collection.
#[derive(Clone, Debug)]
pub struct SledStore {
    pub db: ::sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SledStoreError> {
        Ok(Self {
            db: ::sled::open(path)?,
        })
    }

    fn tree(&self, collection: Collection) -> Result<::sled::Tree, SledStoreError> {
        Ok(self.db.open_tree(collection.name())?)
    }
}

#[derive(Debug)]
pub enum SledStoreError {
    SledError(::sled::Error),
    JsonError(serde_json::Error),
    Duplicate(String),
    Update(UpdateError),
}

impl fmt::Display for SledStoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SledStoreError::SledError(err) => write!(f, "Sled error: {}", err),
            SledStoreError::JsonError(err) => write!(f, "JSON error: {}", err),
            SledStoreError::Duplicate(id) => write!(f, "Document {} already exists", id),
            SledStoreError::Update(err) => write!(f, "Update rejected: {}", err),
        }
    }
}

impl std::error::Error for SledStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SledStoreError::SledError(err) => Some(err),
            SledStoreError::JsonError(err) => Some(err),
            SledStoreError::Update(err) => Some(err),
            SledStoreError::Duplicate(_) => None,
        }
    }
}

impl From<::sled::Error> for SledStoreError {
    fn from(err: ::sled::Error) -> SledStoreError {
        SledStoreError::SledError(err)
    }
}

impl From<serde_json::Error> for SledStoreError {
    fn from(err: serde_json::Error) -> SledStoreError {
        SledStoreError::JsonError(err)
    }
}

impl From<UpdateError> for SledStoreError {
    fn from(err: UpdateError) -> SledStoreError {
        SledStoreError::Update(err)
    }
}

#[async_trait]
impl Store for SledStore {
    type Error = SledStoreError;

    async fn find(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, Self::Error> {
        let tree = self.tree(collection)?;

        let docs = match &query.id {
            Some(id) => match tree.get(id.as_bytes())? {
                Some(bytes) => vec![(id.clone(), serde_json::from_slice(&bytes)?)],
                None => Vec::new(),
            },
            None => {
                let mut docs = Vec::new();
                for item in tree.iter() {
                    let (key, bytes) = item?;
                    let id = String::from_utf8_lossy(&key).into_owned();
                    docs.push((id, serde_json::from_slice(&bytes)?));
                }
                docs
            }
        };

        Ok(query.run(docs))
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
    ) -> Result<(), Self::Error> {
        let tree = self.tree(collection)?;
        let bytes = serde_json::to_vec(&doc)?;

        tree.compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(bytes))?
            .map_err(|_| SledStoreError::Duplicate(id.to_string()))?;

        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        ops: &[UpdateOp],
    ) -> Result<bool, Self::Error> {
        let tree = self.tree(collection)?;

        // sled may run the closure more than once under contention, so the
        // outcome is reset on every attempt.
        let mut failure: Option<SledStoreError> = None;
        let updated = tree.update_and_fetch(id.as_bytes(), |old| {
            failure = None;
            let old = old?;

            let mut doc: Value = match serde_json::from_slice(old) {
                Ok(doc) => doc,
                Err(e) => {
                    failure = Some(e.into());
                    return Some(old.to_vec());
                }
            };

            match apply_all(&mut doc, ops) {
                Ok(()) => match serde_json::to_vec(&doc) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        failure = Some(e.into());
                        Some(old.to_vec())
                    }
                },
                Err(e) => {
                    failure = Some(e.into());
                    Some(old.to_vec())
                }
            }
        })?;

        if let Some(err) = failure {
            return Err(err);
        }

        Ok(updated.is_some())
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<bool, Self::Error> {
        let tree = self.tree(collection)?;
        Ok(tree.remove(id.as_bytes())?.is_some())
    }
}
