//! Shared fixtures for engine workflow tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use studyhub_common::config::{EngineConfig, StoreConfig};
use studyhub_common::error::IdentityFailure;
use studyhub_common::models::{Community, CreateCommunityRequest, Identity, JoinCommunityRequest, Notification};
use studyhub_db::repository::{communities, notifications};
use studyhub_db::storage::MemoryBlobStore;
use studyhub_db::store::MemoryStore;
use studyhub_db::Database;
use studyhub_engine::{Engine, IdentityService};
use uuid::Uuid;

pub struct Fixture {
    pub engine: Engine,
    pub db: Database,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

pub fn fixture() -> Fixture {
    let (db, store) = Database::memory(&StoreConfig::default());
    let blobs = Arc::new(MemoryBlobStore::default());
    let config = EngineConfig {
        role_write_delay_ms: 0,
        ..EngineConfig::default()
    };
    let engine = Engine::new(db.clone(), config, blobs.clone());
    Fixture {
        engine,
        db,
        store,
        blobs,
    }
}

pub fn user(name: &str) -> Identity {
    Identity {
        uid: Uuid::now_v7(),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        display_name: Some(name.to_string()),
        photo_url: None,
    }
}

pub fn draft(name: &str, requires_approval: bool) -> CreateCommunityRequest {
    CreateCommunityRequest {
        name: name.into(),
        description: Some("weekly problem sets".into()),
        category: "cs".into(),
        visibility: None,
        requires_approval: Some(requires_approval),
        tags: vec!["study".into()],
        settings: None,
        banner_url: None,
        icon_url: None,
    }
}

pub fn message(text: &str) -> JoinCommunityRequest {
    JoinCommunityRequest {
        message: Some(text.into()),
    }
}

impl Fixture {
    pub async fn community(&self, id: Uuid) -> Option<Community> {
        communities::find_by_id(&self.db, id).await.unwrap()
    }

    pub async fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        notifications::list_for_user(&self.db, user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, n)| n)
            .collect()
    }
}

/// Identity service double: a fixed signed-in user and a scripted delete result.
pub struct StaticIdentity {
    identity: Identity,
    delete_result: Result<(), IdentityFailure>,
    deletes: Mutex<u32>,
}

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            delete_result: Ok(()),
            deletes: Mutex::new(0),
        }
    }

    pub fn failing_with(identity: Identity, failure: IdentityFailure) -> Self {
        Self {
            delete_result: Err(failure),
            ..Self::new(identity)
        }
    }

    pub fn delete_calls(&self) -> u32 {
        *self.deletes.lock()
    }
}

#[async_trait]
impl IdentityService for StaticIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        Some(self.identity.clone())
    }

    async fn delete_current_identity(&self) -> Result<(), IdentityFailure> {
        *self.deletes.lock() += 1;
        self.delete_result.clone()
    }
}
