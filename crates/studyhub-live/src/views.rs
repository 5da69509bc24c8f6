//! Live views over the document store.
//!
//! Single-document views forward each snapshot. The joined-communities list and
//! the roster are two-tier: an outer query plus one inner document subscription
//! per item, reconciled on every outer event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use studyhub_common::error::StudyHubResult;
use studyhub_common::models::{Community, MemberRole, Membership, RoleRecord, UserProfile};
use studyhub_db::repository::{memberships, roles};
use studyhub_db::store::{DocumentStore, Snapshot, Watch, WatchTarget};
use studyhub_db::{paths, Database};
use tokio::sync::watch;
use uuid::Uuid;

use crate::inner::InnerSet;
use crate::{Live, LiveState};

/// A user's joined communities: ids from their membership rows, documents from
/// the per-community subscriptions that have delivered so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedCommunities {
    pub ids: Vec<Uuid>,
    pub communities: Vec<Community>,
}

impl JoinedCommunities {
    pub fn contains(&self, community_id: Uuid) -> bool {
        self.ids.contains(&community_id)
    }
}

/// Which collection the roster is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterSource {
    Memberships,
    /// The membership query was rejected; Role records stand in.
    Roles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: Option<DateTime<Utc>>,
    /// Live profile name when known, else the name copied at join time.
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub source: RosterSource,
    pub members: Vec<RosterEntry>,
}

impl Roster {
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    pub fn entry(&self, user_id: Uuid) -> Option<&RosterEntry> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

/// Entry point for every live subscription.
#[derive(Clone)]
pub struct LiveViews {
    db: Database,
}

fn first<T: DeserializeOwned>(snaps: &[Snapshot]) -> Option<T> {
    let snap = snaps.first()?;
    match snap.decode() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %snap.path, error = %e, "Skipping malformed document");
            None
        }
    }
}

fn decode_each<T: DeserializeOwned>(snaps: &[Snapshot]) -> Vec<T> {
    snaps.iter().filter_map(|snap| first(std::slice::from_ref(snap))).collect()
}

impl LiveViews {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// A single community document; `Ready(None)` once it is deleted.
    pub async fn subscribe_to_community(&self, community_id: Uuid) -> StudyHubResult<Live<Option<Community>>> {
        self.document(paths::community(community_id)).await
    }

    pub async fn subscribe_to_user_profile(&self, user_id: Uuid) -> StudyHubResult<Live<Option<UserProfile>>> {
        self.document(paths::user(user_id)).await
    }

    async fn document<T>(&self, path: studyhub_db::store::DocPath) -> StudyHubResult<Live<Option<T>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let mut watch = self.db.store.subscribe(WatchTarget::Document(path)).await?;
        let (tx, rx) = watch::channel(LiveState::Loading);
        let task = tokio::spawn(async move {
            while let Some(event) = watch.next().await {
                let state = match event {
                    Ok(snaps) => LiveState::Ready(first::<T>(&snaps)),
                    Err(e) => LiveState::Failed(e.to_string()),
                };
                if tx.send(state).is_err() {
                    break;
                }
            }
        });
        Ok(Live::new(rx, task))
    }

    /// The communities `user_id` belongs to, kept current as memberships and
    /// community documents change.
    pub async fn subscribe_to_user_communities(&self, user_id: Uuid) -> StudyHubResult<Live<JoinedCommunities>> {
        let store = self.db.store.clone();
        let outer = store
            .subscribe(WatchTarget::Query(memberships::user_query(user_id)))
            .await?;
        let (tx, rx) = watch::channel(LiveState::Loading);
        let task = tokio::spawn(run_joined(store, outer, tx));
        Ok(Live::new(rx, task))
    }

    /// The roster of a community with live profile fields.
    ///
    /// Built from Membership rows; if that query is rejected, from Role records.
    pub async fn subscribe_to_community_members(&self, community_id: Uuid) -> StudyHubResult<Live<Roster>> {
        let store = self.db.store.clone();
        let (tx, rx) = watch::channel(LiveState::Loading);
        let task = tokio::spawn(run_roster(store, community_id, tx));
        Ok(Live::new(rx, task))
    }
}

async fn run_joined(
    store: Arc<dyn DocumentStore>,
    mut outer: Watch,
    tx: watch::Sender<LiveState<JoinedCommunities>>,
) {
    let (mut inner, mut inner_rx) = InnerSet::<Uuid>::new(store);
    let mut ids: Vec<Uuid> = Vec::new();
    let mut docs: BTreeMap<Uuid, Community> = BTreeMap::new();

    let publish = |ids: &[Uuid], docs: &BTreeMap<Uuid, Community>| {
        let communities = ids.iter().filter_map(|id| docs.get(id).cloned()).collect();
        tx.send(LiveState::Ready(JoinedCommunities {
            ids: ids.to_vec(),
            communities,
        }))
        .is_ok()
    };

    loop {
        tokio::select! {
            event = outer.next() => match event {
                Some(Ok(snaps)) => {
                    ids.clear();
                    for membership in decode_each::<Membership>(&snaps) {
                        if !ids.contains(&membership.community_id) {
                            ids.push(membership.community_id);
                        }
                    }
                    docs.retain(|id, _| ids.contains(id));
                    inner.reconcile(&ids, |id| paths::community(*id)).await;
                    if !publish(&ids, &docs) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    let _ = tx.send(LiveState::Failed(e.to_string()));
                    break;
                }
                None => break,
            },
            Some((id, event)) = inner_rx.recv() => {
                if !inner.contains(&id) {
                    continue;
                }
                match event {
                    Ok(snaps) => match first::<Community>(&snaps) {
                        Some(community) => {
                            docs.insert(id, community);
                        }
                        None => {
                            docs.remove(&id);
                        }
                    },
                    Err(e) => tracing::warn!(community_id = %id, error = %e, "Community subscription failed"),
                }
                if !publish(&ids, &docs) {
                    break;
                }
            }
        }
    }
}

/// One roster row before profile data is merged in.
struct RosterRow {
    user_id: Uuid,
    role: MemberRole,
    joined_at: Option<DateTime<Utc>>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

fn rows_from(source: RosterSource, snaps: &[Snapshot]) -> Vec<RosterRow> {
    let mut rows: Vec<RosterRow> = match source {
        RosterSource::Memberships => decode_each::<Membership>(snaps)
            .into_iter()
            .map(|m| RosterRow {
                user_id: m.user_id,
                role: m.role,
                joined_at: Some(m.joined_at),
                display_name: m.display_name,
                photo_url: m.photo_url,
            })
            .collect(),
        RosterSource::Roles => decode_each::<RoleRecord>(snaps)
            .into_iter()
            .map(|r| RosterRow {
                user_id: r.user_id,
                role: r.role,
                joined_at: None,
                display_name: None,
                photo_url: None,
            })
            .collect(),
    };
    let mut seen = Vec::with_capacity(rows.len());
    rows.retain(|row| {
        let fresh = !seen.contains(&row.user_id);
        seen.push(row.user_id);
        fresh
    });
    rows
}

async fn open_roster_source(
    store: &Arc<dyn DocumentStore>,
    community_id: Uuid,
    source: RosterSource,
) -> studyhub_db::store::StoreResult<Watch> {
    let query = match source {
        RosterSource::Memberships => memberships::community_query(community_id),
        RosterSource::Roles => roles::collection_query(community_id),
    };
    store.subscribe(WatchTarget::Query(query)).await
}

async fn run_roster(store: Arc<dyn DocumentStore>, community_id: Uuid, tx: watch::Sender<LiveState<Roster>>) {
    let mut source = RosterSource::Memberships;
    let mut outer = match open_roster_source(&store, community_id, source).await {
        Ok(watch) => watch,
        Err(e) => {
            tracing::warn!(community_id = %community_id, error = %e, "Membership roster unavailable; using roles");
            source = RosterSource::Roles;
            match open_roster_source(&store, community_id, source).await {
                Ok(watch) => watch,
                Err(e) => {
                    let _ = tx.send(LiveState::Failed(e.to_string()));
                    return;
                }
            }
        }
    };

    let (mut inner, mut inner_rx) = InnerSet::<Uuid>::new(store.clone());
    let mut rows: Vec<RosterRow> = Vec::new();
    let mut profiles: BTreeMap<Uuid, UserProfile> = BTreeMap::new();

    let publish = |source: RosterSource, rows: &[RosterRow], profiles: &BTreeMap<Uuid, UserProfile>| {
        let members = rows
            .iter()
            .map(|row| {
                let profile = profiles.get(&row.user_id);
                RosterEntry {
                    user_id: row.user_id,
                    role: row.role,
                    joined_at: row.joined_at,
                    display_name: profile
                        .and_then(|p| p.display_name.clone())
                        .or_else(|| row.display_name.clone()),
                    photo_url: profile
                        .and_then(|p| p.photo_url.clone())
                        .or_else(|| row.photo_url.clone()),
                }
            })
            .collect();
        tx.send(LiveState::Ready(Roster { source, members })).is_ok()
    };

    loop {
        tokio::select! {
            event = outer.next() => match event {
                Some(Ok(snaps)) => {
                    rows = rows_from(source, &snaps);
                    let ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
                    profiles.retain(|id, _| ids.contains(id));
                    inner.reconcile(&ids, |id| paths::user(*id)).await;
                    if !publish(source, &rows, &profiles) {
                        break;
                    }
                }
                Some(Err(e)) if source == RosterSource::Memberships => {
                    tracing::warn!(community_id = %community_id, error = %e, "Membership roster rejected; using roles");
                    source = RosterSource::Roles;
                    match open_roster_source(&store, community_id, source).await {
                        Ok(watch) => outer = watch,
                        Err(e) => {
                            let _ = tx.send(LiveState::Failed(e.to_string()));
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    let _ = tx.send(LiveState::Failed(e.to_string()));
                    break;
                }
                None => break,
            },
            Some((id, event)) = inner_rx.recv() => {
                // Late events from a member who already left are dropped.
                if !inner.contains(&id) {
                    continue;
                }
                match event {
                    Ok(snaps) => match first::<UserProfile>(&snaps) {
                        Some(profile) => {
                            profiles.insert(id, profile);
                        }
                        None => {
                            profiles.remove(&id);
                        }
                    },
                    Err(e) => tracing::warn!(user_id = %id, error = %e, "Profile subscription failed"),
                }
                if !publish(source, &rows, &profiles) {
                    break;
                }
            }
        }
    }
}
