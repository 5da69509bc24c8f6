//! Community deletion cascade.
//!
//! Recipients are frozen in the step log before anything is deleted. The deletion
//! group (memberships, roles, join requests, each content subtree, the community
//! document) runs concurrently and tolerates individual failures; notifications
//! are sent afterwards to every frozen recipient regardless.

use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use studyhub_common::error::{StudyHubError, StudyHubResult};
use studyhub_common::models::{ContentKind, Notification, NotificationType};
use studyhub_db::repository::cascades::{self, CascadeKind, CascadeLog};
use studyhub_db::repository::{communities, content, delete_in_batches, join_requests, memberships, notifications, roles};
use uuid::Uuid;

use crate::saga::{self, run_group, CascadeReport, Step, StepOutcome};
use crate::Engine;

pub const STEP_MEMBERSHIPS: &str = "memberships";
pub const STEP_ROLES: &str = "roles";
pub const STEP_JOIN_REQUESTS: &str = "joinRequests";
pub const STEP_COMMUNITY: &str = "community";
const NOTIFY_PREFIX: &str = "notify:";

impl Engine {
    /// Delete a community and everything under it. Admin only.
    ///
    /// Calling this again after a partial failure resumes the same cascade: finished
    /// steps are skipped and the original recipients are notified at most once.
    pub async fn delete_community(&self, actor: Uuid, community_id: Uuid) -> StudyHubResult<CascadeReport> {
        let unfinished = cascades::load(&self.db, CascadeKind::CommunityDeletion, community_id)
            .await?
            .filter(|log| !log.is_finished());

        let mut log = match communities::find_by_id(&self.db, community_id).await? {
            Some(community) => {
                self.require_admin_of(&community, actor).await?;
                unfinished.unwrap_or_else(|| {
                    CascadeLog::start(CascadeKind::CommunityDeletion, community_id, actor, community.name.clone())
                })
            }
            None => match unfinished {
                Some(log) if log.initiated_by == actor => log,
                Some(_) => return Err(StudyHubError::forbidden("Only the admin who started this deletion can resume it")),
                None => return Err(StudyHubError::not_found("Community")),
            },
        };

        self.run_community_cascade(&mut log).await
    }

    pub(crate) async fn run_community_cascade(&self, log: &mut CascadeLog) -> StudyHubResult<CascadeReport> {
        let community_id = log.target_id;
        let resumed = log.recipients.is_some();
        let mut report = CascadeReport::new(community_id, resumed);
        let db = &self.db;

        if log.recipients.is_none() {
            let mut recipients: Vec<Uuid> = Vec::new();
            for row in memberships::list_for_community(db, community_id).await? {
                let uid = row.membership.user_id;
                if uid != log.initiated_by && !recipients.contains(&uid) {
                    recipients.push(uid);
                }
            }
            log.recipients = Some(recipients);
            // Nothing has been deleted yet, so a failed save aborts cleanly.
            cascades::save(db, log).await?;
        }

        let mut steps = vec![
            Step::new(STEP_MEMBERSHIPS, self.delete_memberships(community_id).boxed()),
            Step::new(
                STEP_ROLES,
                async move {
                    let paths = roles::list_paths(db, community_id).await.map_err(|e| e.to_string())?;
                    delete_in_batches(db, paths).await.map_err(|e| e.to_string())
                }
                .boxed(),
            ),
            Step::new(
                STEP_JOIN_REQUESTS,
                async move {
                    let paths = join_requests::paths_for_community(db, community_id)
                        .await
                        .map_err(|e| e.to_string())?;
                    delete_in_batches(db, paths).await.map_err(|e| e.to_string())
                }
                .boxed(),
            ),
        ];
        for kind in ContentKind::ALL {
            steps.push(Step::new(
                kind.collection(),
                async move {
                    let paths = content::list_all(db, community_id, kind).await.map_err(|e| e.to_string())?;
                    delete_in_batches(db, paths).await.map_err(|e| e.to_string())
                }
                .boxed(),
            ));
        }
        steps.push(Step::new(
            STEP_COMMUNITY,
            async move {
                communities::delete(db, community_id)
                    .await
                    .map(|()| 1)
                    .map_err(|e| e.to_string())
            }
            .boxed(),
        ));
        run_group(log, &mut report, steps).await;
        saga::checkpoint(db, log).await;

        let recipients = log.recipients.clone().unwrap_or_default();
        let name = log.target_name.clone();
        let notify_steps = recipients
            .into_iter()
            .map(|uid| {
                let name = name.clone();
                Step::new(
                    format!("{NOTIFY_PREFIX}{uid}"),
                    async move {
                        let kind = NotificationType::CommunityDeleted;
                        let notification = Notification::new(uid, kind, community_id, &name, Utc::now());
                        let key = Notification::key_for(kind, community_id, uid, None);
                        notifications::send(db, &key, &notification)
                            .await
                            .map(|()| 1)
                            .map_err(|e| e.to_string())
                    }
                    .boxed(),
                )
            })
            .collect();
        run_group(log, &mut report, notify_steps).await;
        report.notified = report
            .steps
            .iter()
            .filter(|s| s.step.starts_with(NOTIFY_PREFIX) && matches!(s.outcome, StepOutcome::Done { .. }))
            .count();

        if report.is_clean() {
            log.finished_at = Some(Utc::now());
        }
        saga::checkpoint(db, log).await;

        tracing::info!(
            community_id = %community_id,
            initiated_by = %log.initiated_by,
            notified = report.notified,
            failures = report.failures().count(),
            "Community deletion cascade ran"
        );
        Ok(report)
    }

    /// Delete every membership row of a community one by one, so one failing row
    /// does not keep the others alive.
    async fn delete_memberships(&self, community_id: Uuid) -> Result<usize, String> {
        let rows = memberships::list_for_community(&self.db, community_id)
            .await
            .map_err(|e| e.to_string())?;
        let total = rows.len();
        let results = join_all(rows.iter().map(|row| memberships::delete_row(&self.db, &row.key))).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            return Err(format!("{failed} of {total} membership deletes failed"));
        }
        Ok(total)
    }
}
