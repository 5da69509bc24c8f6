//! Hosted authentication service, as consumed by the engine.
//!
//! Only account deletion talks to it, and only as its terminal step.

use async_trait::async_trait;
use serde::Serialize;
use studyhub_common::error::IdentityFailure;
use studyhub_common::models::Identity;

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The signed-in identity, if any.
    async fn current_identity(&self) -> Option<Identity>;

    /// Irreversibly delete the signed-in identity.
    async fn delete_current_identity(&self) -> Result<(), IdentityFailure>;
}

/// What happened to the authentication identity at the end of account deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityOutcome {
    Deleted,
    /// The credential was too old to delete the identity. Store-side data is already
    /// gone, so the account is treated as deleted.
    StaleCredential,
    AlreadyGone,
    /// Store-side cleanup reported failures; the identity was kept so the user can retry.
    Retained,
}
