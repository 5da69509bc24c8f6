//! Document store contract.
//!
//! The engine treats its hosted store abstractly: collections of JSON documents
//! addressed by `(collection path, key)`, predicate queries, optimistic
//! transactions, bounded batches, and push subscriptions. [`MemoryStore`] is the
//! in-process implementation used in lite mode and tests.

mod memory;
mod transaction;

pub use memory::{Fault, MemoryStore};
pub use transaction::Transaction;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

pub use studyhub_common::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: String,
    pub key: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// A document as read from the store, with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocPath,
    pub version: u64,
    pub data: Document,
}

impl Snapshot {
    pub fn key(&self) -> &str {
        &self.path.key
    }

    /// Deserialize the document into a model type.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.data.clone()))
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", self.path)))
    }
}

/// Serialize a model into a document.
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Turn a `json!({...})` literal into a field patch.
pub fn fields(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// A query predicate on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    ArrayContains(String, Value),
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq(field, expected) => doc.get(field) == Some(expected),
            Self::ArrayContains(field, expected) => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(expected)),
        }
    }
}

/// A predicate query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn where_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters
            .push(Filter::ArrayContains(field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, path: &DocPath, doc: &Document) -> bool {
        path.collection == self.collection && self.filters.iter().all(|f| f.matches(doc))
    }
}

/// A single write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or overwrite the whole document.
    Set { path: DocPath, data: Document },
    /// Merge top-level fields into an existing document; fails if it does not exist.
    Update { path: DocPath, fields: Document },
    /// Delete the document; deleting a missing document succeeds.
    Delete { path: DocPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            Self::Set { path, .. } | Self::Update { path, .. } | Self::Delete { path } => path,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Self::Set { .. } => OpKind::Set,
            Self::Update { .. } => OpKind::Update,
            Self::Delete { .. } => OpKind::Delete,
        }
    }
}

/// Operation classes, used for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Get,
    Query,
    Set,
    Update,
    Delete,
    Subscribe,
}

/// A version check evaluated at commit time. `version: None` means "must not exist".
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    pub path: DocPath,
    pub version: Option<u64>,
}

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchTarget {
    Document(DocPath),
    Query(Query),
}

/// One delivery from a subscription: the full current result set, or an error.
pub type WatchEvent = StoreResult<Vec<Snapshot>>;

/// A live subscription. Dropping it (or calling [`Watch::unsubscribe`]) stops delivery.
pub struct Watch {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Watch {
    pub fn new(rx: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next delivery. `None` once the store has closed the subscription.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

/// The hosted document store, as consumed by the engine.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Snapshot>>;

    async fn query(&self, query: &Query) -> StoreResult<Vec<Snapshot>>;

    /// Atomically check every precondition and apply every write, or do nothing.
    async fn commit(&self, preconditions: Vec<Precondition>, writes: Vec<WriteOp>) -> StoreResult<()>;

    /// Open a subscription. The current state is delivered immediately.
    async fn subscribe(&self, target: WatchTarget) -> StoreResult<Watch>;

    /// Largest number of writes accepted by [`DocumentStore::batch_write`].
    fn max_batch_ops(&self) -> usize;

    async fn set(&self, path: &DocPath, data: Document) -> StoreResult<()> {
        self.commit(Vec::new(), vec![WriteOp::Set { path: path.clone(), data }])
            .await
    }

    async fn update(&self, path: &DocPath, fields: Document) -> StoreResult<()> {
        self.commit(
            Vec::new(),
            vec![WriteOp::Update {
                path: path.clone(),
                fields,
            }],
        )
        .await
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        self.commit(Vec::new(), vec![WriteOp::Delete { path: path.clone() }])
            .await
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let max = self.max_batch_ops();
        if ops.len() > max {
            return Err(StoreError::BatchTooLarge {
                size: ops.len(),
                max,
            });
        }
        self.commit(Vec::new(), ops).await
    }
}
