//! In-process document store (lite mode).
//!
//! Holds every document in one ordered map behind a short synchronous lock; no lock
//! is ever held across an `.await`. Every commit bumps a global clock, and the new
//! clock value becomes the version of each document it wrote. Subscriptions are
//! re-evaluated after each commit that touches their document or collection.
//!
//! Faults can be injected per operation kind and path prefix so partial-failure
//! paths are testable without a real backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use super::{
    DocPath, Document, DocumentStore, OpKind, Precondition, Query, Snapshot, StoreError,
    StoreResult, Watch, WatchEvent, WatchTarget, WriteOp,
};

/// An injected failure: operations of `kind` whose path starts with `path_prefix`
/// fail with `error`, `remaining` more times (forever when `None`).
#[derive(Debug, Clone)]
pub struct Fault {
    pub kind: OpKind,
    pub path_prefix: String,
    pub error: StoreError,
    pub remaining: Option<u32>,
}

impl Fault {
    pub fn unavailable(kind: OpKind, path_prefix: impl Into<String>) -> Self {
        let path_prefix = path_prefix.into();
        Self {
            kind,
            error: StoreError::Unavailable(format!("injected fault on {path_prefix}")),
            path_prefix,
            remaining: None,
        }
    }

    pub fn denied(kind: OpKind, path_prefix: impl Into<String>) -> Self {
        let path_prefix = path_prefix.into();
        Self {
            kind,
            error: StoreError::PermissionDenied(path_prefix.clone()),
            path_prefix,
            remaining: None,
        }
    }

    pub fn times(mut self, n: u32) -> Self {
        self.remaining = Some(n);
        self
    }
}

#[derive(Debug, Clone)]
struct Stored {
    version: u64,
    data: Document,
}

struct Watcher {
    target: WatchTarget,
    tx: mpsc::UnboundedSender<WatchEvent>,
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<DocPath, Stored>,
    clock: u64,
    watchers: Vec<Watcher>,
    faults: Vec<Fault>,
    subscriptions_opened: u64,
}

impl Inner {
    fn check_fault(&mut self, kind: OpKind, target: &str) -> StoreResult<()> {
        let hit = self.faults.iter_mut().find(|f| {
            f.kind == kind && target.starts_with(&f.path_prefix) && f.remaining != Some(0)
        });
        match hit {
            Some(fault) => {
                if let Some(n) = fault.remaining.as_mut() {
                    *n -= 1;
                }
                Err(fault.error.clone())
            }
            None => Ok(()),
        }
    }

    fn notify(&mut self, touched: &[DocPath]) {
        self.watchers.retain(|w| !w.tx.is_closed());
        for watcher in &self.watchers {
            let relevant = match &watcher.target {
                WatchTarget::Document(path) => touched.contains(path),
                WatchTarget::Query(query) => {
                    touched.iter().any(|p| p.collection == query.collection)
                }
            };
            if relevant {
                let _ = watcher.tx.send(Ok(evaluate(&self.docs, &watcher.target)));
            }
        }
    }
}

fn snapshot(path: &DocPath, stored: &Stored) -> Snapshot {
    Snapshot {
        path: path.clone(),
        version: stored.version,
        data: stored.data.clone(),
    }
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn run_query(docs: &BTreeMap<DocPath, Stored>, query: &Query) -> Vec<Snapshot> {
    let mut hits: Vec<Snapshot> = docs
        .iter()
        .filter(|(path, stored)| query.matches(path, &stored.data))
        .map(|(path, stored)| snapshot(path, stored))
        .collect();
    if let Some(field) = &query.order_by {
        hits.sort_by(|a, b| compare_fields(a.data.get(field), b.data.get(field)));
    }
    if let Some(limit) = query.limit {
        hits.truncate(limit);
    }
    hits
}

fn evaluate(docs: &BTreeMap<DocPath, Stored>, target: &WatchTarget) -> Vec<Snapshot> {
    match target {
        WatchTarget::Document(path) => docs
            .get(path)
            .map(|stored| vec![snapshot(path, stored)])
            .unwrap_or_default(),
        WatchTarget::Query(query) => run_query(docs, query),
    }
}

/// In-memory [`DocumentStore`].
pub struct MemoryStore {
    inner: Mutex<Inner>,
    max_batch_ops: usize,
}

impl MemoryStore {
    pub fn new(max_batch_ops: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_batch_ops,
        }
    }

    /// Register a fault. Faults are matched in insertion order.
    pub fn inject(&self, fault: Fault) {
        self.inner.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Number of documents currently in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .docs
            .keys()
            .filter(|p| p.collection == collection)
            .count()
    }

    /// Total subscriptions ever opened.
    pub fn subscriptions_opened(&self) -> u64 {
        self.inner.lock().subscriptions_opened
    }

    /// Subscriptions whose receiver is still alive.
    pub fn active_subscriptions(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|w| !w.tx.is_closed());
        inner.watchers.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Snapshot>> {
        let mut inner = self.inner.lock();
        inner.check_fault(OpKind::Get, &path.to_string())?;
        Ok(inner.docs.get(path).map(|stored| snapshot(path, stored)))
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Snapshot>> {
        let mut inner = self.inner.lock();
        inner.check_fault(OpKind::Query, &query.collection)?;
        Ok(run_query(&inner.docs, query))
    }

    async fn commit(&self, preconditions: Vec<Precondition>, writes: Vec<WriteOp>) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        for op in &writes {
            inner.check_fault(op.kind(), &op.path().to_string())?;
        }

        for pre in &preconditions {
            let current = inner.docs.get(&pre.path).map(|s| s.version);
            if current != pre.version {
                return Err(StoreError::Conflict(pre.path.to_string()));
            }
        }

        // Stage every write first so a failing update leaves the store untouched.
        let mut staged: BTreeMap<DocPath, Option<Document>> = BTreeMap::new();
        for op in writes {
            let path = op.path().clone();
            let current = match staged.get(&path) {
                Some(doc) => doc.clone(),
                None => inner.docs.get(&path).map(|s| s.data.clone()),
            };
            let next = match op {
                WriteOp::Set { data, .. } => Some(data),
                WriteOp::Update { fields, .. } => {
                    let mut doc = current.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
                    doc.extend(fields);
                    Some(doc)
                }
                WriteOp::Delete { .. } => None,
            };
            staged.insert(path, next);
        }

        if staged.is_empty() {
            return Ok(());
        }

        inner.clock += 1;
        let version = inner.clock;
        let touched: Vec<DocPath> = staged.keys().cloned().collect();
        for (path, doc) in staged {
            match doc {
                Some(data) => {
                    inner.docs.insert(path, Stored { version, data });
                }
                None => {
                    inner.docs.remove(&path);
                }
            }
        }

        inner.notify(&touched);
        Ok(())
    }

    async fn subscribe(&self, target: WatchTarget) -> StoreResult<Watch> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.subscriptions_opened += 1;

        let target_path = match &target {
            WatchTarget::Document(path) => path.to_string(),
            WatchTarget::Query(query) => query.collection.clone(),
        };
        // A rejected listener reports its error once and is never registered.
        if let Err(e) = inner.check_fault(OpKind::Subscribe, &target_path) {
            let _ = tx.send(Err(e));
            return Ok(Watch::new(rx));
        }

        let _ = tx.send(Ok(evaluate(&inner.docs, &target)));
        inner.watchers.push(Watcher { target, tx });
        Ok(Watch::new(rx))
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }
}
