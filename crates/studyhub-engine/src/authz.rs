//! Admin authorization.
//!
//! Admin status has three representations that can drift apart: the Role record,
//! the admin-flagged Membership row, and the community's `createdBy`/`admins`
//! fields. Any one of them is sufficient.

use serde::Serialize;
use studyhub_common::error::{StudyHubError, StudyHubResult};
use studyhub_common::models::Community;
use studyhub_db::repository::{communities, memberships, roles};
use uuid::Uuid;

use crate::Engine;

/// Which representation granted admin status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminSignal {
    Role,
    Membership,
    Creator,
    AdminList,
}

impl Engine {
    /// The first signal that makes `user_id` an admin of `community`, if any.
    ///
    /// A failed read of one representation is logged and treated as absent; the
    /// other representations still get a say.
    pub async fn admin_signal(&self, user_id: Uuid, community: &Community) -> Option<AdminSignal> {
        match roles::role_of(&self.db, community.id, user_id).await {
            Ok(Some(role)) if role.is_admin() => return Some(AdminSignal::Role),
            Ok(_) => {}
            Err(e) => tracing::warn!(community_id = %community.id, user_id = %user_id, error = %e, "Role lookup failed"),
        }

        match memberships::find(&self.db, user_id, community.id).await {
            Ok(Some(row)) if row.membership.role.is_admin() => return Some(AdminSignal::Membership),
            Ok(_) => {}
            Err(e) => tracing::warn!(community_id = %community.id, user_id = %user_id, error = %e, "Membership lookup failed"),
        }

        if community.created_by == user_id {
            Some(AdminSignal::Creator)
        } else if community.admins.contains(&user_id) {
            Some(AdminSignal::AdminList)
        } else {
            None
        }
    }

    pub async fn is_admin(&self, user_id: Uuid, community_id: Uuid) -> StudyHubResult<bool> {
        let community = self.load_community(community_id).await?;
        Ok(self.admin_signal(user_id, &community).await.is_some())
    }

    /// Load a community and fail with `Forbidden` unless `user_id` administers it.
    pub async fn require_admin(&self, user_id: Uuid, community_id: Uuid) -> StudyHubResult<Community> {
        let community = self.load_community(community_id).await?;
        self.require_admin_of(&community, user_id).await?;
        Ok(community)
    }

    pub(crate) async fn require_admin_of(&self, community: &Community, user_id: Uuid) -> StudyHubResult<()> {
        match self.admin_signal(user_id, community).await {
            Some(signal) => {
                tracing::debug!(community_id = %community.id, user_id = %user_id, ?signal, "Admin check passed");
                Ok(())
            }
            None => Err(StudyHubError::forbidden("Only community admins can do this")),
        }
    }

    pub async fn load_community(&self, community_id: Uuid) -> StudyHubResult<Community> {
        communities::find_by_id(&self.db, community_id)
            .await?
            .ok_or_else(|| StudyHubError::not_found("Community"))
    }
}
