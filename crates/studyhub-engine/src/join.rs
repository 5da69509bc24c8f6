//! Joining a community.
//!
//! Direct joins run in one transaction that re-checks membership against the same
//! snapshot it increments memberCount from. Approval-required joins write a
//! JoinRequest and then mirror it onto the community document, best-effort.
//!
//! Two near-simultaneous approval-required joins by the same user can both pass the
//! pending-request check. That race is accepted; callers debounce with a join guard.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use studyhub_common::error::{StudyHubError, StudyHubResult};
use studyhub_common::models::{
    Community, Identity, JoinCommunityRequest, JoinRequest, JoinRequestStatus, MemberRole, Membership, RoleRecord,
};
use studyhub_common::{snowflake, validation::validate_request};
use studyhub_db::paths;
use studyhub_db::repository::{communities, join_requests, memberships, roles};
use studyhub_db::store::fields;
use uuid::Uuid;

use crate::Engine;

/// Result of a join attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined(Membership),
    Requested(JoinRequest),
}

impl Engine {
    pub async fn join_community(
        &self,
        user: &Identity,
        community_id: Uuid,
        body: JoinCommunityRequest,
    ) -> StudyHubResult<JoinOutcome> {
        validate_request(&body)?;
        let community = self.load_community(community_id).await?;

        if memberships::is_member_direct(&self.db, user.uid, community_id).await? {
            if memberships::find(&self.db, user.uid, community_id).await?.is_some() {
                return Err(StudyHubError::AlreadyMember);
            }
            // Role record without a Membership row: left over from a failed cleanup.
            tracing::debug!(community_id = %community_id, user_id = %user.uid, "Clearing stray role before join");
            roles::delete(&self.db, community_id, user.uid).await?;
        }

        if community.requires_approval {
            let message = body.message.unwrap_or_default().trim().to_string();
            return self.request_to_join(user, &community, message).await;
        }
        self.join_directly(user, community_id).await
    }

    async fn request_to_join(
        &self,
        user: &Identity,
        community: &Community,
        message: String,
    ) -> StudyHubResult<JoinOutcome> {
        if join_requests::find_pending(&self.db, user.uid, community.id).await?.is_some() {
            return Err(StudyHubError::RequestPending);
        }

        let request = JoinRequest::pending(snowflake::generate_id(), community.id, user, message, Utc::now());
        join_requests::create(&self.db, &request).await?;

        if let Err(e) = communities::push_pending(&self.db, community.id, &request.mirror_entry()).await {
            tracing::warn!(
                community_id = %community.id,
                request_id = %request.id,
                error = %e,
                "Pending mirror update failed"
            );
        }

        tracing::info!(community_id = %community.id, user_id = %user.uid, request_id = %request.id, "Join requested");
        Ok(JoinOutcome::Requested(request))
    }

    async fn join_directly(&self, user: &Identity, community_id: Uuid) -> StudyHubResult<JoinOutcome> {
        let now = Utc::now();
        let membership = Membership::new(user, community_id, MemberRole::Member, now);
        let record = RoleRecord {
            user_id: user.uid,
            role: MemberRole::Member,
            assigned_at: now,
            assigned_by: user.uid,
        };

        let (m, r) = (&membership, &record);
        self.db
            .run_transaction(move |tx| async move {
                let community: Community = tx
                    .get(&paths::community(community_id))
                    .await?
                    .ok_or_else(|| StudyHubError::not_found("Community"))?
                    .decode()?;
                if tx.get(&paths::membership(m.user_id, community_id)).await?.is_some() {
                    return Err(StudyHubError::AlreadyMember);
                }

                memberships::create_in(&tx, m)?;
                roles::put_in(&tx, community_id, r)?;
                tx.update(
                    paths::community(community_id),
                    fields(json!({
                        "memberCount": community.member_count + 1,
                        "lastActivity": now,
                    })),
                );
                Ok::<_, StudyHubError>(())
            })
            .await?;

        tracing::info!(community_id = %community_id, user_id = %user.uid, "Member joined");
        Ok(JoinOutcome::Joined(membership))
    }

    /// Withdraw the caller's own pending request. No notification is sent.
    pub async fn cancel_join_request(&self, user_id: Uuid, request_id: Uuid) -> StudyHubResult<JoinRequest> {
        let mut request = join_requests::find_by_id(&self.db, request_id)
            .await?
            .ok_or_else(|| StudyHubError::not_found("Join request"))?;
        if request.user_id != user_id {
            return Err(StudyHubError::forbidden("You can only cancel your own join requests"));
        }
        if !request.is_pending() {
            return Err(StudyHubError::AlreadyReviewed);
        }

        join_requests::mark_reviewed(&self.db, request_id, JoinRequestStatus::Rejected, user_id).await?;
        if let Err(e) = communities::settle_pending(&self.db, request.community_id, request_id, 0).await {
            tracing::warn!(community_id = %request.community_id, request_id = %request_id, error = %e, "Pending mirror update failed");
        }

        request.status = JoinRequestStatus::Rejected;
        request.reviewed_at = Some(Utc::now());
        request.reviewed_by = Some(user_id);
        tracing::info!(community_id = %request.community_id, request_id = %request_id, "Join request cancelled");
        Ok(request)
    }
}
