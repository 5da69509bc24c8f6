//! Client-side membership cache and in-flight join guard.
//!
//! The cache is a projection of the joined-communities subscription and nothing
//! else: operations never patch it optimistically. Rendering code asks
//! [`MembershipCache::is_member_cached`]; code about to write asks
//! [`MembershipCache::is_member_direct`].

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use studyhub_common::error::StudyHubResult;
use studyhub_common::models::Community;
use studyhub_db::repository::memberships;
use uuid::Uuid;

use crate::views::{JoinedCommunities, LiveViews};
use crate::{Live, LiveState};

pub struct MembershipCache {
    views: LiveViews,
    user_id: Uuid,
    joined: Live<JoinedCommunities>,
}

impl MembershipCache {
    pub async fn start(views: LiveViews, user_id: Uuid) -> StudyHubResult<Self> {
        let joined = views.subscribe_to_user_communities(user_id).await?;
        Ok(Self {
            views,
            user_id,
            joined,
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Non-authoritative check against the last published list.
    ///
    /// While the list is still loading (or its subscription failed) this answers
    /// `false`: a community may show up in discovery once too often, but a real one
    /// is never hidden.
    pub fn is_member_cached(&self, community_id: Uuid) -> bool {
        match self.joined.current() {
            LiveState::Ready(joined) => joined.contains(community_id),
            LiveState::Loading | LiveState::Failed(_) => false,
        }
    }

    /// Authoritative check straight from the store. Call before any mutating join.
    pub async fn is_member_direct(&self, community_id: Uuid) -> StudyHubResult<bool> {
        Ok(memberships::is_member_direct(self.views.db(), self.user_id, community_id).await?)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.joined.current(), LiveState::Loading)
    }

    /// Communities from the last published list.
    pub fn communities(&self) -> Vec<Community> {
        self.joined
            .current()
            .ready()
            .map(|j| j.communities.clone())
            .unwrap_or_default()
    }

    /// Drop the current projection and subscribe afresh.
    pub async fn invalidate(&mut self) -> StudyHubResult<()> {
        self.joined = self.views.subscribe_to_user_communities(self.user_id).await?;
        tracing::debug!(user_id = %self.user_id, "Membership cache invalidated");
        Ok(())
    }

    /// Wait for the next published list; `false` if the subscription has stopped.
    pub async fn changed(&mut self) -> bool {
        self.joined.changed().await
    }

    /// Wait until the cache satisfies `predicate`.
    pub async fn wait_until(&mut self, mut predicate: impl FnMut(&JoinedCommunities) -> bool) -> bool {
        self.joined
            .wait_for(|state| state.ready().is_some_and(&mut predicate))
            .await
            .is_some()
    }
}

/// Tracks communities with a join in flight, so a second click is ignored.
#[derive(Clone, Default)]
pub struct JoinGuard {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl JoinGuard {
    /// Claim `community_id`. `None` if a join for it is already in flight.
    pub fn try_begin(&self, community_id: Uuid) -> Option<JoinTicket> {
        if !self.in_flight.lock().insert(community_id) {
            return None;
        }
        Some(JoinTicket {
            in_flight: self.in_flight.clone(),
            community_id,
        })
    }

    pub fn is_joining(&self, community_id: Uuid) -> bool {
        self.in_flight.lock().contains(&community_id)
    }
}

/// Held for the duration of one join; releases its community on drop.
pub struct JoinTicket {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    community_id: Uuid,
}

impl JoinTicket {
    pub fn community_id(&self) -> Uuid {
        self.community_id
    }
}

impl Drop for JoinTicket {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.community_id);
    }
}
