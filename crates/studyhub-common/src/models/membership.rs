//! Membership and Role records: two shapes of "user X belongs to community Y with role R".
//!
//! A Membership row is queryable by user or by community. A Role record lives under
//! its community so authorization checks never scan the membership collection.
//! Either may exist without the other for a short while; readers default to `Member`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

impl MemberRole {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// A user's membership in a community, with profile fields copied at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: Uuid,
    pub community_id: Uuid,
    #[serde(default)]
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Membership {
    pub fn new(identity: &super::Identity, community_id: Uuid, role: MemberRole, now: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.uid,
            community_id,
            role,
            joined_at: now,
            last_active: now,
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
        }
    }
}

/// Per-community authorization record, keyed by user under `communities/{id}/roles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: MemberRole,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Uuid,
}
