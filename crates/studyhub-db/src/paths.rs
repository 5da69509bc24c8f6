//! Persisted layout.
//!
//! Four top-level record sets (communities, memberships, joinRequests, notifications),
//! user profiles, the cascade step log, and per-community subtrees for roles and content.

use studyhub_common::models::ContentKind;
use uuid::Uuid;

use crate::store::DocPath;

pub const COMMUNITIES: &str = "communities";
pub const MEMBERSHIPS: &str = "memberships";
pub const JOIN_REQUESTS: &str = "joinRequests";
pub const NOTIFICATIONS: &str = "notifications";
pub const USERS: &str = "users";
pub const CASCADES: &str = "cascades";

pub fn community(id: Uuid) -> DocPath {
    DocPath::new(COMMUNITIES, id.to_string())
}

/// Composite key used for every membership written today. Older rows may use other
/// keys, so lookups by (user, community) go through a predicate query.
pub fn membership(user_id: Uuid, community_id: Uuid) -> DocPath {
    DocPath::new(MEMBERSHIPS, format!("{user_id}_{community_id}"))
}

pub fn roles_collection(community_id: Uuid) -> String {
    format!("{COMMUNITIES}/{community_id}/roles")
}

pub fn role(community_id: Uuid, user_id: Uuid) -> DocPath {
    DocPath::new(roles_collection(community_id), user_id.to_string())
}

pub fn join_request(id: Uuid) -> DocPath {
    DocPath::new(JOIN_REQUESTS, id.to_string())
}

pub fn notification(key: impl Into<String>) -> DocPath {
    DocPath::new(NOTIFICATIONS, key)
}

pub fn user(id: Uuid) -> DocPath {
    DocPath::new(USERS, id.to_string())
}

pub fn content_collection(community_id: Uuid, kind: ContentKind) -> String {
    format!("{COMMUNITIES}/{community_id}/{}", kind.collection())
}

pub fn cascade(key: &str) -> DocPath {
    DocPath::new(CASCADES, key)
}
