//! JoinRequest model: a pending application to an approval-required community.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Identity, PendingRequestEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: Uuid,
    pub community_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub message: String,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl JoinRequest {
    pub fn pending(
        id: Uuid,
        community_id: Uuid,
        requester: &Identity,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            community_id,
            user_id: requester.uid,
            message,
            status: JoinRequestStatus::Pending,
            created_at: now,
            reviewed_at: None,
            reviewed_by: None,
            display_name: requester.display_name.clone(),
            email: requester.email.clone(),
            photo_url: requester.photo_url.clone(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == JoinRequestStatus::Pending
    }

    /// The copy embedded in the community document's pending mirror.
    pub fn mirror_entry(&self) -> PendingRequestEntry {
        PendingRequestEntry {
            request_id: self.id,
            user_id: self.user_id,
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
            message: self.message.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct JoinCommunityRequest {
    #[validate(length(max = 500, message = "Message must be at most 500 characters"))]
    pub message: Option<String>,
}
