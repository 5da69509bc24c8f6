//! Optimistic transactions.
//!
//! Reads record the version they observed; writes are buffered. At commit time the
//! store re-checks every observed version and applies the writes only if nothing
//! changed. The runner in [`crate::Database::run_transaction`] retries on conflict.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{DocPath, Document, DocumentStore, Precondition, Snapshot, StoreResult, WriteOp};

#[derive(Default)]
struct TxState {
    reads: BTreeMap<DocPath, Option<u64>>,
    writes: Vec<WriteOp>,
}

/// Handle passed to a transaction body. Cheap to clone; all clones share one buffer.
#[derive(Clone)]
pub struct Transaction {
    store: Arc<dyn DocumentStore>,
    state: Arc<Mutex<TxState>>,
}

impl Transaction {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(TxState::default())),
        }
    }

    /// Read a document and pin its version for the commit-time check.
    pub async fn get(&self, path: &DocPath) -> StoreResult<Option<Snapshot>> {
        let snapshot = self.store.get(path).await?;
        let version = snapshot.as_ref().map(|s| s.version);
        // First observation wins; a later re-read must not hide an earlier change.
        self.state
            .lock()
            .reads
            .entry(path.clone())
            .or_insert(version);
        Ok(snapshot)
    }

    pub fn set(&self, path: DocPath, data: Document) {
        self.state.lock().writes.push(WriteOp::Set { path, data });
    }

    pub fn update(&self, path: DocPath, fields: Document) {
        self.state.lock().writes.push(WriteOp::Update { path, fields });
    }

    pub fn delete(&self, path: DocPath) {
        self.state.lock().writes.push(WriteOp::Delete { path });
    }

    pub(crate) fn into_commit(self) -> (Vec<Precondition>, Vec<WriteOp>) {
        let mut state = self.state.lock();
        let reads = std::mem::take(&mut state.reads);
        let writes = std::mem::take(&mut state.writes);
        let preconditions = reads
            .into_iter()
            .map(|(path, version)| Precondition { path, version })
            .collect();
        (preconditions, writes)
    }
}
