//! Account deletion cascade.
//!
//! Order matters. Discovery and the bulk of the store-side deletes run
//! concurrently; the profile and avatar go next; the authentication identity is
//! deleted last and only when everything before it succeeded, so a failure never
//! leaves a deleted identity with data still attached.

use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use std::collections::BTreeSet;
use studyhub_common::error::{IdentityFailure, StoreError, StudyHubError, StudyHubResult};
use studyhub_common::models::{Community, ContentKind};
use studyhub_db::repository::cascades::{self, CascadeKind, CascadeLog};
use studyhub_db::repository::memberships::MembershipRow;
use studyhub_db::repository::{
    communities, content, delete_in_batches, join_requests, memberships, notifications, roles, users,
};
use studyhub_db::storage;
use uuid::Uuid;

use crate::identity::{IdentityOutcome, IdentityService};
use crate::saga::{self, run_group, CascadeReport, Step, StepOutcome};
use crate::Engine;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletionReport {
    pub user_id: Uuid,
    pub cascade: CascadeReport,
    /// Communities the user created, each torn down in full.
    pub communities_deleted: usize,
    pub identity: IdentityOutcome,
}

/// Record a failed discovery query and carry on with an empty result.
fn discovered<T: Default>(report: &mut CascadeReport, step: &str, result: Result<T, StoreError>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(step, error = %e, "Account discovery query failed");
        report.record(step, StepOutcome::Failed { error: e.to_string() });
        T::default()
    })
}

impl Engine {
    /// Delete the signed-in user's account and everything it owns.
    pub async fn delete_user_account(&self, identity: &dyn IdentityService) -> StudyHubResult<AccountDeletionReport> {
        let me = identity.current_identity().await.ok_or(StudyHubError::Unauthorized)?;
        let uid = me.uid;
        let db = &self.db;

        let mut log = match cascades::load(db, CascadeKind::AccountDeletion, uid).await? {
            Some(log) if !log.is_finished() => log,
            _ => CascadeLog::start(
                CascadeKind::AccountDeletion,
                uid,
                uid,
                me.display_name.clone().unwrap_or_default(),
            ),
        };
        let mut report = CascadeReport::new(uid, !log.completed_steps.is_empty());

        let (created, joined, pending, notes, profile) = tokio::join!(
            communities::list_created_by(db, uid),
            memberships::list_for_user(db, uid),
            join_requests::list_pending_for_user(db, uid),
            notifications::list_for_user(db, uid),
            users::find_profile(db, uid),
        );
        let created = discovered(&mut report, "discover:created", created);
        let joined = discovered(&mut report, "discover:memberships", joined);
        let pending = discovered(&mut report, "discover:requests", pending);
        let notes = discovered(&mut report, "discover:notifications", notes);
        let profile = discovered(&mut report, "discover:profile", profile);

        let created_ids: BTreeSet<Uuid> = created.iter().map(|c| c.id).collect();
        let owned: Vec<&Community> = created
            .iter()
            .filter(|c| !log.is_done(&created_step(c.id)))
            .collect();

        let mut steps: Vec<Step<'_>> = joined
            .into_iter()
            .filter(|row| !created_ids.contains(&row.membership.community_id))
            .map(|row| {
                Step::new(
                    format!("joined:{}", row.membership.community_id),
                    self.purge_membership(row, uid).boxed(),
                )
            })
            .collect();

        let request_ids: Vec<(Uuid, Uuid)> = pending.iter().map(|r| (r.id, r.community_id)).collect();
        let skip_mirrors = created_ids.clone();
        steps.push(Step::new(
            "requests",
            async move { self.withdraw_requests(request_ids, &skip_mirrors).await }.boxed(),
        ));

        let note_paths = notes.into_iter().map(|(path, _)| path).collect();
        steps.push(Step::new(
            "notifications",
            async move { delete_in_batches(db, note_paths).await.map_err(|e| e.to_string()) }.boxed(),
        ));

        let owned_cascades = join_all(owned.iter().map(|c| self.cascade_owned(c, uid)));
        let (owned_results, ()) = tokio::join!(owned_cascades, run_group(&mut log, &mut report, steps));

        let mut communities_deleted = 0;
        for (community, result) in owned.iter().zip(owned_results) {
            let step = created_step(community.id);
            match result {
                Ok(sub) => {
                    let clean = sub.is_clean();
                    report.absorb(&step, sub);
                    if clean {
                        communities_deleted += 1;
                        log.mark_done(step);
                    }
                }
                Err(e) => report.record(step, StepOutcome::Failed { error: e.to_string() }),
            }
        }
        saga::checkpoint(db, &log).await;

        let avatar = profile
            .and_then(|p| p.avatar_key)
            .unwrap_or_else(|| storage::avatar_key(uid));
        let blobs = self.blobs.clone();
        let tail = vec![
            Step::new(
                "profile",
                async move { users::delete_profile(db, uid).await.map(|()| 1).map_err(|e| e.to_string()) }.boxed(),
            ),
            Step::new(
                "avatar",
                async move { blobs.delete_object(&avatar).await.map(|()| 1).map_err(|e| e.to_string()) }.boxed(),
            ),
        ];
        run_group(&mut log, &mut report, tail).await;
        saga::checkpoint(db, &log).await;

        let outcome = if !report.is_clean() {
            tracing::warn!(
                user_id = %uid,
                failures = report.failures().count(),
                "Account cleanup incomplete; keeping the identity so deletion can be retried"
            );
            IdentityOutcome::Retained
        } else {
            match identity.delete_current_identity().await {
                Ok(()) => IdentityOutcome::Deleted,
                Err(IdentityFailure::RequiresRecentLogin) => {
                    tracing::warn!(user_id = %uid, "Identity delete needs a recent sign-in; account data already removed");
                    IdentityOutcome::StaleCredential
                }
                Err(IdentityFailure::UserNotFound) => IdentityOutcome::AlreadyGone,
                Err(e) => {
                    tracing::error!(user_id = %uid, error = %e, "Identity delete failed");
                    return Err(StudyHubError::Identity(e));
                }
            }
        };

        if outcome != IdentityOutcome::Retained {
            log.finished_at = Some(Utc::now());
            saga::checkpoint(db, &log).await;
        }

        tracing::info!(user_id = %uid, ?outcome, communities_deleted, "Account deletion ran");
        Ok(AccountDeletionReport {
            user_id: uid,
            cascade: report,
            communities_deleted,
            identity: outcome,
        })
    }

    async fn cascade_owned(&self, community: &Community, uid: Uuid) -> StudyHubResult<CascadeReport> {
        let mut log = match cascades::load(&self.db, CascadeKind::CommunityDeletion, community.id).await? {
            Some(log) if !log.is_finished() => log,
            _ => CascadeLog::start(CascadeKind::CommunityDeletion, community.id, uid, community.name.clone()),
        };
        self.run_community_cascade(&mut log).await
    }

    /// Remove the user from a community they joined: authored content, Role record,
    /// then the Membership row and the counter.
    ///
    /// The row goes last so a failed run leaves it behind for the next run to find.
    async fn purge_membership(&self, row: MembershipRow, uid: Uuid) -> Result<usize, String> {
        let db = &self.db;
        let community_id = row.membership.community_id;
        let mut failures = Vec::new();
        let mut affected = 0;

        let scans = join_all(ContentKind::ALL.map(|kind| async move {
            let paths = content::list_authored(db, community_id, kind, uid).await?;
            delete_in_batches(db, paths).await
        }))
        .await;
        for (kind, result) in ContentKind::ALL.iter().zip(scans) {
            match result {
                Ok(n) => affected += n,
                Err(e) => failures.push(format!("{}: {e}", kind.collection())),
            }
        }

        let was_admin = row.membership.role.is_admin()
            || matches!(roles::role_of(db, community_id, uid).await, Ok(Some(role)) if role.is_admin());
        if let Err(e) = roles::delete(db, community_id, uid).await {
            failures.push(format!("role: {e}"));
        }

        if failures.is_empty() {
            match memberships::delete_row(db, &row.key).await {
                Ok(()) => {
                    affected += 1;
                    if let Err(e) = communities::adjust_member_count(db, community_id, -1).await {
                        failures.push(format!("memberCount: {e}"));
                    }
                    if was_admin {
                        if let Err(e) = self.rebuild_admin_list(community_id).await {
                            failures.push(format!("admins: {e}"));
                        }
                    }
                }
                Err(e) => failures.push(format!("membership: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(affected)
        } else {
            Err(failures.join("; "))
        }
    }

    /// Delete the user's pending requests and rebuild the affected mirrors.
    async fn withdraw_requests(&self, requests: Vec<(Uuid, Uuid)>, skip: &BTreeSet<Uuid>) -> Result<usize, String> {
        let results = join_all(requests.iter().map(|(id, _)| join_requests::delete(&self.db, *id))).await;
        let mut failures: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();

        let affected: BTreeSet<Uuid> = requests
            .iter()
            .map(|(_, cid)| *cid)
            .filter(|cid| !skip.contains(cid))
            .collect();
        for community_id in affected {
            match self.rebuild_pending_mirror(community_id).await {
                Ok(_) | Err(StudyHubError::Store(StoreError::NotFound(_))) => {}
                Err(e) => failures.push(format!("mirror {community_id}: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(requests.len())
        } else {
            Err(failures.join("; "))
        }
    }
}

fn created_step(community_id: Uuid) -> String {
    format!("created:{community_id}")
}
