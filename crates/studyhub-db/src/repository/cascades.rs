//! Cascade step log.
//!
//! Multi-step teardowns record which steps finished and the recipient list they
//! froze, so a re-run after a partial failure skips finished steps and notifies
//! exactly the users the first run would have notified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::paths;
use crate::store::{to_document, StoreResult};
use crate::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeKind {
    CommunityDeletion,
    AccountDeletion,
}

impl CascadeKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::CommunityDeletion => "community",
            Self::AccountDeletion => "account",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeLog {
    pub kind: CascadeKind,
    pub target_id: Uuid,
    pub initiated_by: Uuid,
    /// Display name captured before the target document disappears.
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub completed_steps: BTreeSet<String>,
    /// Frozen before any deletion; `None` until the first run computes it.
    #[serde(default)]
    pub recipients: Option<Vec<Uuid>>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl CascadeLog {
    pub fn start(kind: CascadeKind, target_id: Uuid, initiated_by: Uuid, target_name: String) -> Self {
        Self {
            kind,
            target_id,
            initiated_by,
            target_name,
            completed_steps: BTreeSet::new(),
            recipients: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn key(kind: CascadeKind, target_id: Uuid) -> String {
        format!("{}:{target_id}", kind.prefix())
    }

    pub fn is_done(&self, step: &str) -> bool {
        self.completed_steps.contains(step)
    }

    pub fn mark_done(&mut self, step: impl Into<String>) {
        self.completed_steps.insert(step.into());
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

pub async fn load(db: &Database, kind: CascadeKind, target_id: Uuid) -> StoreResult<Option<CascadeLog>> {
    db.store
        .get(&paths::cascade(&CascadeLog::key(kind, target_id)))
        .await?
        .map(|snap| snap.decode())
        .transpose()
}

pub async fn save(db: &Database, log: &CascadeLog) -> StoreResult<()> {
    db.store
        .set(
            &paths::cascade(&CascadeLog::key(log.kind, log.target_id)),
            to_document(log)?,
        )
        .await
}
