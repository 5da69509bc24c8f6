//! Membership repository.
//!
//! Lookups by (user, community) go through a predicate query rather than the
//! composite key, because historical rows were not always keyed that way.

use chrono::Utc;
use serde_json::json;
use studyhub_common::models::{MemberRole, Membership};
use uuid::Uuid;

use crate::paths;
use crate::store::{fields, to_document, DocPath, Query, StoreResult, Transaction};
use crate::Database;

use super::{decode_all, roles};

/// A membership together with the key of the document that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipRow {
    pub key: String,
    pub membership: Membership,
}

impl MembershipRow {
    pub fn path(&self) -> DocPath {
        DocPath::new(paths::MEMBERSHIPS, self.key.clone())
    }
}

fn rows(snaps: &[crate::store::Snapshot]) -> Vec<MembershipRow> {
    decode_all::<Membership>(snaps)
        .into_iter()
        .map(|(key, membership)| MembershipRow { key, membership })
        .collect()
}

/// All memberships of a community, oldest first.
pub fn community_query(community_id: Uuid) -> Query {
    Query::collection(paths::MEMBERSHIPS)
        .where_eq("communityId", community_id.to_string())
        .order_by("joinedAt")
}

/// All memberships of a user.
pub fn user_query(user_id: Uuid) -> Query {
    Query::collection(paths::MEMBERSHIPS).where_eq("userId", user_id.to_string())
}

/// Stage a new membership inside a transaction, at its composite key.
pub fn create_in(tx: &Transaction, membership: &Membership) -> StoreResult<()> {
    tx.set(
        paths::membership(membership.user_id, membership.community_id),
        to_document(membership)?,
    );
    Ok(())
}

/// Write a new membership at its composite key.
pub async fn create(db: &Database, membership: &Membership) -> StoreResult<()> {
    db.store
        .set(
            &paths::membership(membership.user_id, membership.community_id),
            to_document(membership)?,
        )
        .await
}

/// Find a user's membership in a community, whatever key it is stored under.
pub async fn find(db: &Database, user_id: Uuid, community_id: Uuid) -> StoreResult<Option<MembershipRow>> {
    let query = user_query(user_id).where_eq("communityId", community_id.to_string());
    let snaps = db.store.query(&query).await?;
    Ok(rows(&snaps).into_iter().next())
}

pub async fn list_for_community(db: &Database, community_id: Uuid) -> StoreResult<Vec<MembershipRow>> {
    let snaps = db.store.query(&community_query(community_id)).await?;
    Ok(rows(&snaps))
}

pub async fn list_for_user(db: &Database, user_id: Uuid) -> StoreResult<Vec<MembershipRow>> {
    let snaps = db.store.query(&user_query(user_id)).await?;
    Ok(rows(&snaps))
}

pub async fn delete_row(db: &Database, key: &str) -> StoreResult<()> {
    db.store.delete(&DocPath::new(paths::MEMBERSHIPS, key)).await
}

pub async fn set_role(db: &Database, key: &str, role: MemberRole) -> StoreResult<()> {
    db.store
        .update(
            &DocPath::new(paths::MEMBERSHIPS, key),
            fields(json!({ "role": role, "lastActive": Utc::now() })),
        )
        .await
}

/// Authoritative membership check: the Role record first, then the membership row
/// for the window where only one of the two has been written.
pub async fn is_member_direct(db: &Database, user_id: Uuid, community_id: Uuid) -> StoreResult<bool> {
    if roles::find(db, community_id, user_id).await?.is_some() {
        return Ok(true);
    }
    Ok(find(db, user_id, community_id).await?.is_some())
}
