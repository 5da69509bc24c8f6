//! Reviewing join requests.
//!
//! The JoinRequest status update is the authoritative write. The community's
//! pending mirror and the requester's notification are secondary: their failures
//! are logged, never returned.

use chrono::Utc;
use studyhub_common::error::{StudyHubError, StudyHubResult};
use studyhub_common::models::{
    Community, Identity, JoinRequest, JoinRequestStatus, MemberRole, Membership, Notification, NotificationType,
    PendingRequestEntry, RoleRecord,
};
use studyhub_db::repository::{communities, join_requests, memberships, notifications, roles};
use uuid::Uuid;

use crate::Engine;

impl Engine {
    pub async fn approve_join_request(&self, reviewer: Uuid, request_id: Uuid) -> StudyHubResult<Membership> {
        let (request, community) = self.open_request(reviewer, request_id).await?;
        let now = Utc::now();

        let (membership, created) = match memberships::find(&self.db, request.user_id, community.id).await? {
            Some(row) => (row.membership, false),
            None => {
                let requester = Identity {
                    uid: request.user_id,
                    email: request.email.clone(),
                    display_name: request.display_name.clone(),
                    photo_url: request.photo_url.clone(),
                };
                let membership = Membership::new(&requester, community.id, MemberRole::Member, now);
                memberships::create(&self.db, &membership).await?;
                (membership, true)
            }
        };

        match roles::find(&self.db, community.id, request.user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let record = RoleRecord {
                    user_id: request.user_id,
                    role: MemberRole::Member,
                    assigned_at: now,
                    assigned_by: reviewer,
                };
                if let Err(e) = roles::put(&self.db, community.id, &record).await {
                    tracing::warn!(community_id = %community.id, user_id = %request.user_id, error = %e, "Role write failed");
                }
            }
            Err(e) => tracing::warn!(community_id = %community.id, user_id = %request.user_id, error = %e, "Role lookup failed"),
        }

        join_requests::mark_reviewed(&self.db, request.id, JoinRequestStatus::Approved, reviewer).await?;

        let delta = if created { 1 } else { 0 };
        self.settle_mirror(&community, request.id, delta).await;
        self.notify(&request, &community, NotificationType::JoinApproved).await;

        tracing::info!(community_id = %community.id, user_id = %request.user_id, reviewer = %reviewer, "Join request approved");
        Ok(membership)
    }

    pub async fn reject_join_request(&self, reviewer: Uuid, request_id: Uuid) -> StudyHubResult<JoinRequest> {
        let (mut request, community) = self.open_request(reviewer, request_id).await?;

        join_requests::mark_reviewed(&self.db, request.id, JoinRequestStatus::Rejected, reviewer).await?;
        self.settle_mirror(&community, request.id, 0).await;
        self.notify(&request, &community, NotificationType::JoinRejected).await;

        request.status = JoinRequestStatus::Rejected;
        request.reviewed_at = Some(Utc::now());
        request.reviewed_by = Some(reviewer);
        tracing::info!(community_id = %community.id, user_id = %request.user_id, reviewer = %reviewer, "Join request rejected");
        Ok(request)
    }

    /// Pending requests of a community, read from the authoritative collection.
    pub async fn list_pending_requests(&self, actor: Uuid, community_id: Uuid) -> StudyHubResult<Vec<JoinRequest>> {
        self.require_admin(actor, community_id).await?;
        Ok(join_requests::list_pending(&self.db, community_id).await?)
    }

    /// Recompute the community's pending mirror from pending JoinRequest rows.
    pub async fn repair_pending_mirror(&self, actor: Uuid, community_id: Uuid) -> StudyHubResult<Vec<PendingRequestEntry>> {
        self.require_admin(actor, community_id).await?;
        self.rebuild_pending_mirror(community_id).await
    }

    pub(crate) async fn rebuild_pending_mirror(&self, community_id: Uuid) -> StudyHubResult<Vec<PendingRequestEntry>> {
        let pending: Vec<PendingRequestEntry> = join_requests::list_pending(&self.db, community_id)
            .await?
            .iter()
            .map(JoinRequest::mirror_entry)
            .collect();
        communities::replace_pending(&self.db, community_id, &pending).await?;
        tracing::debug!(community_id = %community_id, pending = pending.len(), "Pending mirror rebuilt");
        Ok(pending)
    }

    /// Load a request that is still pending, and its community, checking the reviewer.
    async fn open_request(&self, reviewer: Uuid, request_id: Uuid) -> StudyHubResult<(JoinRequest, Community)> {
        let request = join_requests::find_by_id(&self.db, request_id)
            .await?
            .ok_or_else(|| StudyHubError::not_found("Join request"))?;
        if !request.is_pending() {
            return Err(StudyHubError::AlreadyReviewed);
        }
        let community = self.require_admin(reviewer, request.community_id).await?;
        Ok((request, community))
    }

    async fn settle_mirror(&self, community: &Community, request_id: Uuid, member_delta: i64) {
        if let Err(e) = communities::settle_pending(&self.db, community.id, request_id, member_delta).await {
            tracing::warn!(
                community_id = %community.id,
                request_id = %request_id,
                error = %e,
                "Community mirror update failed"
            );
        }
    }

    async fn notify(&self, request: &JoinRequest, community: &Community, kind: NotificationType) {
        let notification = Notification::new(request.user_id, kind, community.id, &community.name, Utc::now());
        let key = Notification::key_for(kind, community.id, request.user_id, Some(request.id));
        if let Err(e) = notifications::send(&self.db, &key, &notification).await {
            tracing::warn!(user_id = %request.user_id, kind = kind.as_str(), error = %e, "Notification failed");
        }
    }
}
