//! Community content subtrees: only what the engine needs for cascades.

use studyhub_common::models::ContentKind;
use uuid::Uuid;

use crate::paths;
use crate::store::{DocPath, Query, StoreResult};
use crate::Database;

/// Every document of one content subtree.
pub async fn list_all(db: &Database, community_id: Uuid, kind: ContentKind) -> StoreResult<Vec<DocPath>> {
    let query = Query::collection(paths::content_collection(community_id, kind));
    Ok(db
        .store
        .query(&query)
        .await?
        .into_iter()
        .map(|snap| snap.path)
        .collect())
}

/// Documents of one content subtree authored by `user_id`.
pub async fn list_authored(
    db: &Database,
    community_id: Uuid,
    kind: ContentKind,
    user_id: Uuid,
) -> StoreResult<Vec<DocPath>> {
    let query = Query::collection(paths::content_collection(community_id, kind))
        .where_eq(kind.author_field(), user_id.to_string());
    Ok(db
        .store
        .query(&query)
        .await?
        .into_iter()
        .map(|snap| snap.path)
        .collect())
}
