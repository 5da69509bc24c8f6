//! Notification outbox. Fire-and-forget from the engine's point of view.

use studyhub_common::models::Notification;
use uuid::Uuid;

use crate::paths;
use crate::store::{to_document, DocPath, Query, StoreResult};
use crate::Database;

use super::decode_all;

/// Write a notification at a deterministic key; re-sending overwrites instead of duplicating.
pub async fn send(db: &Database, key: &str, notification: &Notification) -> StoreResult<()> {
    db.store
        .set(&paths::notification(key), to_document(notification)?)
        .await
}

/// Notifications addressed to a user, oldest first.
pub async fn list_for_user(db: &Database, user_id: Uuid) -> StoreResult<Vec<(DocPath, Notification)>> {
    let query = Query::collection(paths::NOTIFICATIONS)
        .where_eq("userId", user_id.to_string())
        .order_by("createdAt");
    let snaps = db.store.query(&query).await?;
    Ok(decode_all(&snaps)
        .into_iter()
        .map(|(key, n)| (paths::notification(key), n))
        .collect())
}
