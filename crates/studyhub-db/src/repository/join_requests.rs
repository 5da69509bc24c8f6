//! JoinRequest repository.
//!
//! At most one pending request per (user, community) is enforced by the caller's
//! pre-write existence check, not by the store.

use chrono::Utc;
use serde_json::json;
use studyhub_common::models::{JoinRequest, JoinRequestStatus};
use uuid::Uuid;

use crate::paths;
use crate::store::{fields, to_document, DocPath, Query, StoreResult};
use crate::Database;

use super::decode_all;

fn pending_status() -> serde_json::Value {
    json!(JoinRequestStatus::Pending)
}

pub async fn create(db: &Database, request: &JoinRequest) -> StoreResult<()> {
    db.store
        .set(&paths::join_request(request.id), to_document(request)?)
        .await
}

pub async fn find_by_id(db: &Database, id: Uuid) -> StoreResult<Option<JoinRequest>> {
    db.store
        .get(&paths::join_request(id))
        .await?
        .map(|snap| snap.decode())
        .transpose()
}

pub async fn find_pending(db: &Database, user_id: Uuid, community_id: Uuid) -> StoreResult<Option<JoinRequest>> {
    let query = Query::collection(paths::JOIN_REQUESTS)
        .where_eq("userId", user_id.to_string())
        .where_eq("communityId", community_id.to_string())
        .where_eq("status", pending_status());
    let snaps = db.store.query(&query).await?;
    Ok(decode_all(&snaps).into_iter().map(|(_, r)| r).next())
}

/// Pending requests of a community, oldest first.
pub async fn list_pending(db: &Database, community_id: Uuid) -> StoreResult<Vec<JoinRequest>> {
    let query = Query::collection(paths::JOIN_REQUESTS)
        .where_eq("communityId", community_id.to_string())
        .where_eq("status", pending_status())
        .order_by("createdAt");
    let snaps = db.store.query(&query).await?;
    Ok(decode_all(&snaps).into_iter().map(|(_, r)| r).collect())
}

/// Paths of every request of a community, including ones that fail to decode.
pub async fn paths_for_community(db: &Database, community_id: Uuid) -> StoreResult<Vec<DocPath>> {
    let query = Query::collection(paths::JOIN_REQUESTS).where_eq("communityId", community_id.to_string());
    Ok(db.store.query(&query).await?.into_iter().map(|snap| snap.path).collect())
}

pub async fn list_pending_for_user(db: &Database, user_id: Uuid) -> StoreResult<Vec<JoinRequest>> {
    let query = Query::collection(paths::JOIN_REQUESTS)
        .where_eq("userId", user_id.to_string())
        .where_eq("status", pending_status());
    let snaps = db.store.query(&query).await?;
    Ok(decode_all(&snaps).into_iter().map(|(_, r)| r).collect())
}

/// Record a review decision.
pub async fn mark_reviewed(
    db: &Database,
    id: Uuid,
    status: JoinRequestStatus,
    reviewer: Uuid,
) -> StoreResult<()> {
    db.store
        .update(
            &paths::join_request(id),
            fields(json!({
                "status": status,
                "reviewedAt": Utc::now(),
                "reviewedBy": reviewer,
            })),
        )
        .await
}

pub async fn delete(db: &Database, id: Uuid) -> StoreResult<()> {
    db.store.delete(&paths::join_request(id)).await
}
