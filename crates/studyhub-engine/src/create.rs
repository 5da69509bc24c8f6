//! Community creation.

use chrono::Utc;
use std::time::Duration;
use studyhub_common::error::{StudyHubError, StudyHubResult};
use studyhub_common::models::{Community, CreateCommunityRequest, Identity, MemberRole, Membership, RoleRecord};
use studyhub_common::{snowflake, validation::validate_request};
use studyhub_db::repository::{communities, memberships, roles};

use crate::Engine;

impl Engine {
    /// Create a community owned by `creator`.
    ///
    /// The community and the creator's admin membership commit together. The Role
    /// record follows after `role_write_delay_ms`; if that write fails the community
    /// stands, since `createdBy`/`admins` still grant admin status.
    pub async fn create_community(
        &self,
        creator: &Identity,
        draft: CreateCommunityRequest,
    ) -> StudyHubResult<Community> {
        validate_request(&draft)?;

        let joined = memberships::list_for_user(&self.db, creator.uid).await?;
        if joined.len() >= self.config.max_communities_per_user {
            return Err(StudyHubError::LimitReached {
                message: format!(
                    "You can be in at most {} communities",
                    self.config.max_communities_per_user
                ),
            });
        }

        let now = Utc::now();
        let community = Community::new(snowflake::generate_id(), creator.uid, draft, now);
        let membership = Membership::new(creator, community.id, MemberRole::Admin, now);

        let (c, m) = (&community, &membership);
        self.db
            .run_transaction(move |tx| async move {
                communities::create_in(&tx, c)?;
                memberships::create_in(&tx, m)?;
                Ok::<_, StudyHubError>(())
            })
            .await?;

        if self.config.role_write_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.role_write_delay_ms)).await;
        }
        let record = RoleRecord {
            user_id: creator.uid,
            role: MemberRole::Admin,
            assigned_at: Utc::now(),
            assigned_by: creator.uid,
        };
        if let Err(e) = roles::put(&self.db, community.id, &record).await {
            tracing::warn!(
                community_id = %community.id,
                error = %e,
                "Creator role write failed; admin status still held via createdBy"
            );
        }

        tracing::info!(
            community_id = %community.id,
            creator = %creator.uid,
            name = %community.name,
            "Community created"
        );

        Ok(community)
    }
}
