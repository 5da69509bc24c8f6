//! Community repository.
//!
//! Counter and mirror writers always re-read the document immediately before writing
//! and derive the new value from that fresh read.

use chrono::Utc;
use serde_json::json;
use studyhub_common::models::{Community, PendingRequestEntry};
use uuid::Uuid;

use crate::paths;
use crate::store::{fields, to_document, Query, StoreResult, Transaction};
use crate::Database;

use super::decode_all;

/// Stage the insert of a new community inside a transaction.
pub fn create_in(tx: &Transaction, community: &Community) -> StoreResult<()> {
    tx.set(paths::community(community.id), to_document(community)?);
    Ok(())
}

/// Find a community by ID.
pub async fn find_by_id(db: &Database, id: Uuid) -> StoreResult<Option<Community>> {
    db.store
        .get(&paths::community(id))
        .await?
        .map(|snap| snap.decode())
        .transpose()
}

/// Communities created by a user.
pub async fn list_created_by(db: &Database, user_id: Uuid) -> StoreResult<Vec<Community>> {
    let snaps = db
        .store
        .query(&Query::collection(paths::COMMUNITIES).where_eq("createdBy", user_id.to_string()))
        .await?;
    Ok(decode_all(&snaps).into_iter().map(|(_, c)| c).collect())
}

/// Apply `delta` to memberCount (never below zero) and touch lastActivity.
///
/// Returns the new count, or `None` if the community no longer exists.
pub async fn adjust_member_count(db: &Database, id: Uuid, delta: i64) -> StoreResult<Option<i64>> {
    let Some(community) = find_by_id(db, id).await? else {
        return Ok(None);
    };
    let count = (community.member_count + delta).max(0);
    db.store
        .update(
            &paths::community(id),
            fields(json!({ "memberCount": count, "lastActivity": Utc::now() })),
        )
        .await?;
    Ok(Some(count))
}

/// Append a request to the pending mirror (idempotent per request id).
pub async fn push_pending(db: &Database, id: Uuid, entry: &PendingRequestEntry) -> StoreResult<()> {
    let Some(community) = find_by_id(db, id).await? else {
        return Err(crate::store::StoreError::NotFound(paths::community(id).to_string()));
    };
    let mut pending = community.pending_join_requests;
    if pending.iter().any(|p| p.request_id == entry.request_id) {
        return Ok(());
    }
    pending.push(entry.clone());
    write_pending(db, id, &pending, None).await
}

/// Drop a request from the pending mirror and apply `member_delta` to memberCount,
/// all in one write. Returns whether the mirror held the request.
pub async fn settle_pending(
    db: &Database,
    id: Uuid,
    request_id: Uuid,
    member_delta: i64,
) -> StoreResult<bool> {
    let Some(community) = find_by_id(db, id).await? else {
        return Ok(false);
    };
    let mut pending = community.pending_join_requests;
    let before = pending.len();
    pending.retain(|p| p.request_id != request_id);
    let found = pending.len() != before;
    let member_count = (member_delta != 0).then(|| (community.member_count + member_delta).max(0));
    write_pending(db, id, &pending, member_count).await?;
    Ok(found)
}

/// Overwrite the pending mirror wholesale (used by the repair operation).
pub async fn replace_pending(db: &Database, id: Uuid, pending: &[PendingRequestEntry]) -> StoreResult<()> {
    write_pending(db, id, pending, None).await
}

async fn write_pending(
    db: &Database,
    id: Uuid,
    pending: &[PendingRequestEntry],
    member_count: Option<i64>,
) -> StoreResult<()> {
    let mut patch = fields(json!({
        "pendingJoinRequests": pending,
        "pendingRequestsCount": pending.len(),
        "lastActivity": Utc::now(),
    }));
    if let Some(count) = member_count {
        patch.insert("memberCount".into(), json!(count));
    }
    db.store.update(&paths::community(id), patch).await
}

/// Replace the derived admin list.
pub async fn set_admins(db: &Database, id: Uuid, admins: &[Uuid]) -> StoreResult<()> {
    db.store
        .update(&paths::community(id), fields(json!({ "admins": admins })))
        .await
}

/// Delete the community document itself.
pub async fn delete(db: &Database, id: Uuid) -> StoreResult<()> {
    db.store.delete(&paths::community(id)).await
}
