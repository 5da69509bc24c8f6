//! Community routes: create, join, leave, moderate, tear down.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studyhub_common::{
    error::StudyHubResult,
    models::{Community, CreateCommunityRequest, JoinCommunityRequest, JoinRequest, MemberRole, PendingRequestEntry},
};
use studyhub_db::repository::memberships;
use studyhub_engine::{CascadeReport, JoinOutcome};
use uuid::Uuid;

use crate::{middleware::AuthContext, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/communities", post(create_community))
        .route("/communities/{community_id}", get(get_community).delete(delete_community))
        .route("/communities/{community_id}/join", post(join_community))
        .route("/communities/{community_id}/leave", post(leave_community))
        .route("/communities/{community_id}/membership", get(membership_status))
        .route("/communities/{community_id}/requests", get(list_requests))
        .route("/communities/{community_id}/requests/repair", post(repair_requests))
        .route("/communities/{community_id}/members/{user_id}", delete(remove_member))
        .route("/communities/{community_id}/members/{user_id}/role", put(set_member_role))
}

/// POST /api/v1/communities — Create a community; the caller becomes its admin.
async fn create_community(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCommunityRequest>,
) -> StudyHubResult<(StatusCode, Json<Community>)> {
    let community = state.engine.create_community(&auth.identity, body).await?;
    tracing::info!(community_id = %community.id, user_id = %auth.user_id(), "Community created");
    Ok((StatusCode::CREATED, Json(community)))
}

/// GET /api/v1/communities/{community_id}
async fn get_community(
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<Uuid>,
) -> StudyHubResult<Json<Community>> {
    Ok(Json(state.engine.load_community(community_id).await?))
}

/// POST /api/v1/communities/{community_id}/join — Join directly, or file a request
/// when the community requires approval.
async fn join_community(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<Uuid>,
    body: Option<Json<JoinCommunityRequest>>,
) -> StudyHubResult<Json<JoinOutcome>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state.engine.join_community(&auth.identity, community_id, body).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/communities/{community_id}/leave
async fn leave_community(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<Uuid>,
) -> StudyHubResult<StatusCode> {
    state.engine.leave_community(auth.user_id(), community_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/communities/{community_id} — Cascading teardown. Re-issuing the
/// call after a partial failure resumes from the persisted step log.
async fn delete_community(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<Uuid>,
) -> StudyHubResult<Json<CascadeReport>> {
    let report = state.engine.delete_community(auth.user_id(), community_id).await?;
    Ok(Json(report))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MembershipStatus {
    community_id: Uuid,
    is_member: bool,
}

/// GET /api/v1/communities/{community_id}/membership — Direct (uncached) check.
async fn membership_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<Uuid>,
) -> StudyHubResult<Json<MembershipStatus>> {
    let is_member = memberships::is_member_direct(state.engine.db(), auth.user_id(), community_id).await?;
    Ok(Json(MembershipStatus { community_id, is_member }))
}

/// GET /api/v1/communities/{community_id}/requests — Pending requests, oldest first.
async fn list_requests(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<Uuid>,
) -> StudyHubResult<Json<Vec<JoinRequest>>> {
    let pending = state.engine.list_pending_requests(auth.user_id(), community_id).await?;
    Ok(Json(pending))
}

/// POST /api/v1/communities/{community_id}/requests/repair — Rebuild the pending
/// mirror on the community document from the request rows.
async fn repair_requests(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<Uuid>,
) -> StudyHubResult<Json<Vec<PendingRequestEntry>>> {
    let mirror = state.engine.repair_pending_mirror(auth.user_id(), community_id).await?;
    Ok(Json(mirror))
}

/// DELETE /api/v1/communities/{community_id}/members/{user_id}
async fn remove_member(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((community_id, user_id)): Path<(Uuid, Uuid)>,
) -> StudyHubResult<StatusCode> {
    state.engine.remove_member(auth.user_id(), community_id, user_id).await?;
    tracing::info!(community_id = %community_id, user_id = %user_id, actor = %auth.user_id(), "Member removed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SetRoleBody {
    role: MemberRole,
}

#[derive(Serialize)]
struct AdminList {
    admins: Vec<Uuid>,
}

/// PUT /api/v1/communities/{community_id}/members/{user_id}/role — Promote or demote.
async fn set_member_role(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((community_id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetRoleBody>,
) -> StudyHubResult<Json<AdminList>> {
    let admins = state
        .engine
        .set_member_role(auth.user_id(), community_id, user_id, body.role)
        .await?;
    Ok(Json(AdminList { admins }))
}
