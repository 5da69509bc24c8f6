//! User profile repository.

use studyhub_common::models::UserProfile;
use uuid::Uuid;

use crate::paths;
use crate::store::{to_document, StoreResult};
use crate::Database;

pub async fn find_profile(db: &Database, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
    db.store
        .get(&paths::user(user_id))
        .await?
        .map(|snap| snap.decode())
        .transpose()
}

pub async fn put_profile(db: &Database, profile: &UserProfile) -> StoreResult<()> {
    db.store
        .set(&paths::user(profile.uid), to_document(profile)?)
        .await
}

pub async fn delete_profile(db: &Database, user_id: Uuid) -> StoreResult<()> {
    db.store.delete(&paths::user(user_id)).await
}
