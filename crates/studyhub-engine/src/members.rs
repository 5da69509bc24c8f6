//! Leaving, removal, and role changes.
//!
//! `Community.admins` is a derived cache. It is never edited in place; every role
//! change or admin departure rebuilds it from the Role and Membership rows.

use chrono::Utc;
use studyhub_common::error::{StudyHubError, StudyHubResult};
use studyhub_common::models::{Community, MemberRole, RoleRecord};
use studyhub_db::repository::{communities, memberships, roles};
use uuid::Uuid;

use crate::Engine;

impl Engine {
    /// Leave a community. Reports `NotFound` when the caller is not a member.
    pub async fn leave_community(&self, user_id: Uuid, community_id: Uuid) -> StudyHubResult<()> {
        let community = self.load_community(community_id).await?;
        if community.created_by == user_id {
            return Err(StudyHubError::forbidden(
                "The creator cannot leave their community; delete it instead",
            ));
        }
        self.detach_member(&community, user_id).await?;
        tracing::info!(community_id = %community_id, user_id = %user_id, "Member left");
        Ok(())
    }

    /// Remove another member. Admin only; the creator cannot be removed.
    pub async fn remove_member(&self, actor: Uuid, community_id: Uuid, target: Uuid) -> StudyHubResult<()> {
        let community = self.require_admin(actor, community_id).await?;
        if community.created_by == target {
            return Err(StudyHubError::forbidden("The community creator cannot be removed"));
        }
        self.detach_member(&community, target).await?;
        tracing::info!(community_id = %community_id, user_id = %target, removed_by = %actor, "Member removed");
        Ok(())
    }

    /// Promote or demote a member, then rebuild the admin list. Returns the new list.
    ///
    /// The creator cannot be demoted, so every community keeps at least one admin.
    pub async fn set_member_role(
        &self,
        actor: Uuid,
        community_id: Uuid,
        target: Uuid,
        role: MemberRole,
    ) -> StudyHubResult<Vec<Uuid>> {
        let community = self.require_admin(actor, community_id).await?;
        if community.created_by == target && role != MemberRole::Admin {
            return Err(StudyHubError::forbidden("The community creator cannot be demoted"));
        }
        let row = memberships::find(&self.db, target, community_id)
            .await?
            .ok_or_else(|| StudyHubError::not_found("Membership"))?;

        memberships::set_role(&self.db, &row.key, role).await?;
        let record = RoleRecord {
            user_id: target,
            role,
            assigned_at: Utc::now(),
            assigned_by: actor,
        };
        roles::put(&self.db, community_id, &record).await?;

        let admins = self.rebuild_admin_list(community_id).await?;
        tracing::info!(community_id = %community_id, user_id = %target, ?role, changed_by = %actor, "Member role changed");
        Ok(admins)
    }

    /// Recompute `Community.admins` from the authoritative rows plus the creator.
    pub async fn rebuild_admin_list(&self, community_id: Uuid) -> StudyHubResult<Vec<Uuid>> {
        let community = self.load_community(community_id).await?;
        let admins = self.collect_admins(&community).await?;
        communities::set_admins(&self.db, community_id, &admins).await?;
        tracing::debug!(community_id = %community_id, admins = admins.len(), "Admin list rebuilt");
        Ok(admins)
    }

    /// Creator first, then admins from Role records and admin-flagged Membership rows.
    /// Either source may fail on its own; both failing is an error.
    async fn collect_admins(&self, community: &Community) -> StudyHubResult<Vec<Uuid>> {
        let mut admins = vec![community.created_by];
        let mut push = |id: Uuid| {
            if !admins.contains(&id) {
                admins.push(id);
            }
        };

        let from_roles = roles::list(&self.db, community.id).await;
        let from_memberships = memberships::list_for_community(&self.db, community.id).await;

        match (from_roles, from_memberships) {
            (Err(e), Err(_)) => return Err(e.into()),
            (from_roles, from_memberships) => {
                match from_roles {
                    Ok(records) => records
                        .into_iter()
                        .filter(|r| r.role.is_admin())
                        .for_each(|r| push(r.user_id)),
                    Err(e) => tracing::warn!(community_id = %community.id, error = %e, "Role listing failed; using memberships"),
                }
                match from_memberships {
                    Ok(rows) => rows
                        .into_iter()
                        .filter(|r| r.membership.role.is_admin())
                        .for_each(|r| push(r.membership.user_id)),
                    Err(e) => tracing::warn!(community_id = %community.id, error = %e, "Membership listing failed; using roles"),
                }
            }
        }
        Ok(admins)
    }

    /// Shared by leave and remove: delete the Membership row (authoritative), then
    /// the Role record, the counter, and the admin cache, each best-effort.
    pub(crate) async fn detach_member(&self, community: &Community, user_id: Uuid) -> StudyHubResult<()> {
        let Some(row) = memberships::find(&self.db, user_id, community.id).await? else {
            // A Role record can outlive its Membership row when an earlier delete failed.
            if let Err(e) = roles::delete(&self.db, community.id, user_id).await {
                tracing::warn!(community_id = %community.id, user_id = %user_id, error = %e, "Stray role delete failed");
            }
            return Err(StudyHubError::not_found("Membership"));
        };
        memberships::delete_row(&self.db, &row.key).await?;

        let role = roles::role_of(&self.db, community.id, user_id).await.unwrap_or_else(|e| {
            tracing::warn!(community_id = %community.id, user_id = %user_id, error = %e, "Role lookup failed");
            None
        });
        if let Err(e) = roles::delete(&self.db, community.id, user_id).await {
            tracing::warn!(community_id = %community.id, user_id = %user_id, error = %e, "Role delete failed");
        }

        if let Err(e) = communities::adjust_member_count(&self.db, community.id, -1).await {
            tracing::warn!(community_id = %community.id, error = %e, "Member count update failed");
        }

        let was_admin = row.membership.role.is_admin()
            || role.is_some_and(MemberRole::is_admin)
            || community.admins.contains(&user_id);
        if was_admin {
            if let Err(e) = self.rebuild_admin_list(community.id).await {
                tracing::warn!(community_id = %community.id, error = %e, "Admin list rebuild failed");
            }
        }
        Ok(())
    }
}
