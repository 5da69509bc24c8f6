//! Notification outbox: written as a side effect, never read back by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    JoinApproved,
    JoinRejected,
    CommunityDeleted,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JoinApproved => "join_approved",
            Self::JoinRejected => "join_rejected",
            Self::CommunityDeleted => "community_deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    /// Structured payload; always carries `communityId` for authorization scoping.
    pub data: serde_json::Value,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationType,
        community_id: Uuid,
        community_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let (title, message) = match kind {
            NotificationType::JoinApproved => (
                "Join request approved".to_string(),
                format!("You are now a member of {community_name}."),
            ),
            NotificationType::JoinRejected => (
                "Join request declined".to_string(),
                format!("Your request to join {community_name} was declined."),
            ),
            NotificationType::CommunityDeleted => (
                "Community deleted".to_string(),
                format!("{community_name} has been deleted by an admin."),
            ),
        };
        Self {
            user_id,
            kind,
            title,
            message,
            data: serde_json::json!({
                "communityId": community_id,
                "communityName": community_name,
            }),
            read: false,
            created_at: now,
        }
    }

    /// Deterministic document key: writing the same notification twice is a no-op.
    pub fn key_for(kind: NotificationType, community_id: Uuid, user_id: Uuid, discriminator: Option<Uuid>) -> String {
        match discriminator {
            Some(d) => format!("{}_{community_id}_{user_id}_{d}", kind.as_str()),
            None => format!("{}_{community_id}_{user_id}", kind.as_str()),
        }
    }
}
