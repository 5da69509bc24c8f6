//! Repository layer: query functions organized by record set.

pub mod cascades;
pub mod communities;
pub mod content;
pub mod join_requests;
pub mod memberships;
pub mod notifications;
pub mod roles;
pub mod users;

use serde::de::DeserializeOwned;

use crate::store::{DocPath, Snapshot, StoreError, StoreResult, WriteOp};
use crate::Database;

/// Decode a result set, skipping (and logging) documents that do not fit the model.
pub(crate) fn decode_all<T: DeserializeOwned>(snapshots: &[Snapshot]) -> Vec<(String, T)> {
    snapshots
        .iter()
        .filter_map(|snap| match snap.decode::<T>() {
            Ok(value) => Some((snap.key().to_string(), value)),
            Err(e) => {
                tracing::warn!(path = %snap.path, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}

/// Delete `paths` in batches no larger than the store allows.
///
/// Every chunk is attempted even if an earlier one fails; the first failure is
/// returned after all chunks have run.
pub async fn delete_in_batches(db: &Database, paths: Vec<DocPath>) -> StoreResult<usize> {
    let max = db.store.max_batch_ops().max(1);
    let mut deleted = 0;
    let mut first_error: Option<StoreError> = None;

    for chunk in paths.chunks(max) {
        let ops = chunk
            .iter()
            .map(|path| WriteOp::Delete { path: path.clone() })
            .collect();
        match db.store.batch_write(ops).await {
            Ok(()) => deleted += chunk.len(),
            Err(e) => {
                tracing::warn!(chunk = chunk.len(), error = %e, "Batch delete failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(deleted),
    }
}
