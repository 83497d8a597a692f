//! Document store gateway.
//!
//! The gateway only needs a narrow slice of a document database: find with a
//! selector and projection, insert, update with field operators, and remove.
//! [`Store`] captures that slice; [`memory::MemStore`] and (with the
//! `sled-store` feature) [`sled::SledStore`] implement it. Selector,
//! projection and update semantics live here so every backend shares them.

use std::{cmp::Ordering, fmt::Debug};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::error::Error;

pub mod memory;
#[cfg(feature = "sled-store")]
pub mod sled;

pub use memory::MemStore;
#[cfg(feature = "sled-store")]
pub use self::sled::SledStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Devices,
    Channels,
    Messages,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Devices, Collection::Channels, Collection::Messages];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Devices => "devices",
            Collection::Channels => "channels",
            Collection::Messages => "messages",
        }
    }
}

/// Selector condition on a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Inclusive numeric range
    Range { field: String, min: f64, max: f64 },
}

impl Filter {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::Range { field, min, max } => doc
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= *min && v <= *max),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

/// Selector plus projection for [`Store::find`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub id: Option<String>,
    pub filters: Vec<Filter>,
    /// `$slice` on an array field: positive keeps the first n, negative the last n
    pub slice: Option<(String, i64)>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id<S: Into<String>>(id: S) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn eq<F: Into<String>, V: Into<Value>>(mut self, field: F, value: V) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn range<F: Into<String>>(mut self, field: F, min: f64, max: f64) -> Self {
        self.filters.push(Filter::Range {
            field: field.into(),
            min,
            max,
        });
        self
    }

    pub fn slice<F: Into<String>>(mut self, field: F, n: i64) -> Self {
        self.slice = Some((field.into(), n));
        self
    }

    pub fn sort_by<F: Into<String>>(mut self, field: F, descending: bool) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn matches(&self, id: &str, doc: &Value) -> bool {
        self.id.as_deref().is_none_or(|wanted| wanted == id)
            && self.filters.iter().all(|f| f.matches(doc))
    }

    /// Apply the projection to a matched document
    pub fn project(&self, mut doc: Value) -> Value {
        if let Some((field, n)) = &self.slice {
            if let Some(Value::Array(items)) = doc.get_mut(field) {
                if *n >= 0 {
                    items.truncate(*n as usize);
                } else {
                    let keep = n.unsigned_abs() as usize;
                    if items.len() > keep {
                        items.drain(..items.len() - keep);
                    }
                }
            }
        }
        doc
    }

    /// Select, order, limit and project `(id, document)` pairs
    pub fn run<I>(&self, docs: I) -> Vec<Value>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut matched: Vec<Value> = docs
            .into_iter()
            .filter(|(id, doc)| self.matches(id, doc))
            .map(|(_, doc)| doc)
            .collect();

        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| {
                let ord = compare_values(a.get(&sort.field), b.get(&sort.field));
                if sort.descending { ord.reverse() } else { ord }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        matched.into_iter().map(|doc| self.project(doc)).collect()
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Field-scoped update operators. A single [`Store::update`] call applies
/// its whole operator list to one document atomically.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set(String, Value),
    /// Append values not already present
    AddToSet(String, Vec<Value>),
    /// Remove every occurrence of the values
    Pull(String, Vec<Value>),
    /// Append values
    Push(String, Vec<Value>),
}

#[derive(Debug, Error, PartialEq)]
pub enum UpdateError {
    #[error("document is not an object")]
    NotAnObject,
    #[error("field '{0}' is not an array")]
    NotAnArray(String),
}

impl UpdateOp {
    pub fn set<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        UpdateOp::Set(field.into(), value.into())
    }

    pub fn add_to_set<F, I, V>(field: F, values: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        UpdateOp::AddToSet(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn pull<F, I, V>(field: F, values: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        UpdateOp::Pull(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn push<F, I, V>(field: F, values: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        UpdateOp::Push(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn apply(&self, doc: &mut Value) -> Result<(), UpdateError> {
        let object = doc.as_object_mut().ok_or(UpdateError::NotAnObject)?;

        let (field, values) = match self {
            UpdateOp::Set(field, value) => {
                object.insert(field.clone(), value.clone());
                return Ok(());
            }
            UpdateOp::AddToSet(field, values)
            | UpdateOp::Pull(field, values)
            | UpdateOp::Push(field, values) => (field, values),
        };

        let items = match object
            .entry(field.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => items,
            _ => return Err(UpdateError::NotAnArray(field.clone())),
        };

        match self {
            UpdateOp::AddToSet(..) => {
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
            UpdateOp::Pull(..) => items.retain(|item| !values.contains(item)),
            UpdateOp::Push(..) => items.extend(values.iter().cloned()),
            UpdateOp::Set(..) => {}
        }

        Ok(())
    }
}

/// Apply `ops` in order; on error `doc` may be partially updated, so
/// backends apply to a copy.
pub fn apply_all(doc: &mut Value, ops: &[UpdateOp]) -> Result<(), UpdateError> {
    ops.iter().try_for_each(|op| op.apply(doc))
}

/// A document-collection backend.
#[async_trait]
pub trait Store: Clone + Debug + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the projected documents matching `query`.
    async fn find(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, Self::Error>;

    /// Inserts a new document. Fails if `id` is taken.
    async fn insert(&self, collection: Collection, id: &str, doc: Value)
    -> Result<(), Self::Error>;

    /// Applies `ops` to one document. Returns `false` if there is no such document.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        ops: &[UpdateOp],
    ) -> Result<bool, Self::Error>;

    /// Removes a document. Returns `false` if there was no such document.
    async fn remove(&self, collection: Collection, id: &str) -> Result<bool, Self::Error>;
}

/// Typed helpers over [`Store`] that speak the gateway error type
#[async_trait]
pub trait StoreExt: Store {
    async fn get<T>(&self, collection: Collection, id: &str) -> crate::Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.get_with(collection, &Query::by_id(id)).await
    }

    async fn get_with<T>(&self, collection: Collection, query: &Query) -> crate::Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let docs = self.find(collection, query).await.map_err(Error::store)?;
        docs.into_iter()
            .next()
            .map(|doc| serde_json::from_value(doc).map_err(Error::store))
            .transpose()
    }

    async fn list<T>(&self, collection: Collection, query: &Query) -> crate::Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let docs = self.find(collection, query).await.map_err(Error::store)?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Error::store))
            .collect()
    }

    async fn put<T>(&self, collection: Collection, id: &str, doc: &T) -> crate::Result<()>
    where
        T: Serialize + Sync,
    {
        let doc = serde_json::to_value(doc).map_err(Error::store)?;
        self.insert(collection, id, doc).await.map_err(Error::store)
    }

    async fn modify(&self, collection: Collection, id: &str, ops: &[UpdateOp]) -> crate::Result<bool> {
        self.update(collection, id, ops).await.map_err(Error::store)
    }

    async fn delete(&self, collection: Collection, id: &str) -> crate::Result<bool> {
        self.remove(collection, id).await.map_err(Error::store)
    }
}

impl<S: Store> StoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_to_set_is_idempotent() {
        let mut doc = json!({"id": "d1"});
        let op = UpdateOp::add_to_set("channels", ["c1", "c2"]);
        op.apply(&mut doc).unwrap();
        op.apply(&mut doc).unwrap();
        assert_eq!(doc["channels"], json!(["c1", "c2"]));
    }

    #[test]
    fn test_pull_removes_all_occurrences() {
        let mut doc = json!({"devices": ["a", "b", "a", "c"]});
        UpdateOp::pull("devices", ["a", "z"]).apply(&mut doc).unwrap();
        assert_eq!(doc["devices"], json!(["b", "c"]));
    }

    #[test]
    fn test_push_on_non_array_fails() {
        let mut doc = json!({"entries": 3});
        assert_eq!(
            UpdateOp::push("entries", [1]).apply(&mut doc),
            Err(UpdateError::NotAnArray("entries".into()))
        );
    }

    #[test]
    fn test_slice_projection() {
        let doc = json!({"entries": [1, 2, 3, 4, 5]});
        assert_eq!(
            Query::all().slice("entries", -2).project(doc.clone())["entries"],
            json!([4, 5])
        );
        assert_eq!(
            Query::all().slice("entries", 2).project(doc.clone())["entries"],
            json!([1, 2])
        );
        assert_eq!(
            Query::all().slice("entries", -100).project(doc)["entries"],
            json!([1, 2, 3, 4, 5])
        );
    }

    lazy_static! {
        // Messages of two channels, stored out of time order
        static ref MESSAGES: Vec<(String, Value)> = [("c", 3), ("c", 1), ("d", 2), ("c", 4), ("c", 0), ("c", 2)]
            .iter()
            .enumerate()
            .map(|(i, (channel, t))| (format!("m{}", i), json!({"channel": channel, "t": t})))
            .collect();
    }

    #[test]
    fn test_range_is_inclusive() {
        let found = Query::all()
            .eq("channel", "c")
            .range("t", 1.0, 3.0)
            .sort_by("t", false)
            .run(MESSAGES.iter().cloned());
        let times: Vec<_> = found.iter().map(|m| m["t"].clone()).collect();
        assert_eq!(times, [json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_sort_and_limit() {
        let found = Query::all()
            .sort_by("t", true)
            .limit(2)
            .run(MESSAGES.iter().cloned());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0]["t"], 4);
        assert_eq!(found[1]["t"], 3);
    }

    #[test]
    fn test_lookup_by_id() {
        let found = Query::by_id("m2").run(MESSAGES.iter().cloned());
        assert_eq!(found, [json!({"channel": "d", "t": 2})]);
    }
}
