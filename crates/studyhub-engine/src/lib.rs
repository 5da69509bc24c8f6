//! # studyhub-engine
//!
//! Consistency engine for StudyHub. Every workflow that touches more than one
//! representation of "user X belongs to community Y with role R" lives here:
//! - **create** — community + creator membership in one transaction, Role record after
//! - **join** — direct join (transactional) or a pending JoinRequest (mirrored)
//! - **review** — approve / reject / cancel, pending mirror repair
//! - **members** — leave, remove, promote / demote, admin list rebuild
//! - **teardown** / **account** — cascading deletes driven by a persisted step log
//!
//! Route handlers call into [`Engine`]; they never write the store directly.

pub mod account;
pub mod authz;
pub mod create;
pub mod identity;
pub mod join;
pub mod members;
pub mod review;
pub mod saga;
pub mod teardown;

pub use account::AccountDeletionReport;
pub use authz::AdminSignal;
pub use identity::{IdentityOutcome, IdentityService};
pub use join::JoinOutcome;
pub use saga::{CascadeReport, StepOutcome, StepReport};

use std::sync::Arc;

use studyhub_common::config::EngineConfig;
use studyhub_db::{storage::BlobStore, Database};

/// Shared handle to the consistency engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    db: Database,
    config: EngineConfig,
    blobs: Arc<dyn BlobStore>,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, config, blobs }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
