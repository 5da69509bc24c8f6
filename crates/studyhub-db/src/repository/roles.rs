//! Role repository: per-community authorization records.

use studyhub_common::models::{MemberRole, RoleRecord};
use uuid::Uuid;

use crate::paths;
use crate::store::{to_document, DocPath, Query, StoreResult, Transaction};
use crate::Database;

use super::decode_all;

/// Every Role record of a community.
pub fn collection_query(community_id: Uuid) -> Query {
    Query::collection(paths::roles_collection(community_id)).order_by("assignedAt")
}

pub async fn find(db: &Database, community_id: Uuid, user_id: Uuid) -> StoreResult<Option<RoleRecord>> {
    db.store
        .get(&paths::role(community_id, user_id))
        .await?
        .map(|snap| snap.decode())
        .transpose()
}

pub async fn role_of(db: &Database, community_id: Uuid, user_id: Uuid) -> StoreResult<Option<MemberRole>> {
    Ok(find(db, community_id, user_id).await?.map(|r| r.role))
}

pub fn put_in(tx: &Transaction, community_id: Uuid, record: &RoleRecord) -> StoreResult<()> {
    tx.set(paths::role(community_id, record.user_id), to_document(record)?);
    Ok(())
}

pub async fn put(db: &Database, community_id: Uuid, record: &RoleRecord) -> StoreResult<()> {
    db.store
        .set(&paths::role(community_id, record.user_id), to_document(record)?)
        .await
}

/// Delete a Role record. A missing record is not an error.
pub async fn delete(db: &Database, community_id: Uuid, user_id: Uuid) -> StoreResult<()> {
    db.store.delete(&paths::role(community_id, user_id)).await
}

pub async fn list(db: &Database, community_id: Uuid) -> StoreResult<Vec<RoleRecord>> {
    let snaps = db.store.query(&collection_query(community_id)).await?;
    Ok(decode_all(&snaps).into_iter().map(|(_, r)| r).collect())
}

/// Paths of every Role record in a community, including ones that fail to decode.
pub async fn list_paths(db: &Database, community_id: Uuid) -> StoreResult<Vec<DocPath>> {
    let snaps = db.store.query(&collection_query(community_id)).await?;
    Ok(snaps.into_iter().map(|snap| snap.path).collect())
}
