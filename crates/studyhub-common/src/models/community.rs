//! Community model: the study-group container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Whether a community is listed in discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A study-group community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub visibility: Visibility,
    /// Joining creates a JoinRequest instead of a Membership.
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub tags: Vec<String>,

    /// Member count (denormalized, equals the number of Membership rows)
    pub member_count: i64,

    pub created_by: Uuid,

    /// Admin user IDs (derived cache, rebuilt from Role records)
    #[serde(default)]
    pub admins: Vec<Uuid>,

    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    /// Community-level settings (JSON blob for flexibility)
    #[serde(default)]
    pub settings: serde_json::Value,

    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,

    /// Advisory mirror of pending JoinRequest rows, readable by anyone who can read the community.
    #[serde(default)]
    pub pending_join_requests: Vec<PendingRequestEntry>,
    #[serde(default)]
    pub pending_requests_count: i64,
}

impl Community {
    /// Build a fresh community owned by `creator`, counting the creator as its only member.
    pub fn new(id: Uuid, creator: Uuid, draft: CreateCommunityRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description.unwrap_or_default(),
            category: draft.category,
            visibility: draft.visibility.unwrap_or_default(),
            requires_approval: draft.requires_approval.unwrap_or(false),
            tags: draft.tags,
            member_count: 1,
            created_by: creator,
            admins: vec![creator],
            created_at: now,
            last_activity: now,
            settings: draft.settings.unwrap_or_else(|| serde_json::json!({})),
            banner_url: draft.banner_url,
            icon_url: draft.icon_url,
            pending_join_requests: Vec::new(),
            pending_requests_count: 0,
        }
    }
}

/// Denormalized copy of a pending JoinRequest embedded in the community document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestEntry {
    pub request_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommunityRequest {
    #[validate(
        length(min = 3, max = 100, message = "Community name must be 3-100 characters"),
        custom(function = "crate::validation::validate_name")
    )]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    pub category: String,

    pub visibility: Option<Visibility>,

    pub requires_approval: Option<bool>,

    #[serde(default)]
    #[validate(custom(function = "crate::validation::validate_tags"))]
    pub tags: Vec<String>,

    pub settings: Option<serde_json::Value>,
    pub banner_url: Option<String>,
    pub icon_url: Option<String>,
}
