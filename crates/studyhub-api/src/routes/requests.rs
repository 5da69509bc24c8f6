//! Join request review routes.

use axum::{
    extract::{Extension, Path, State},
    routing::{delete, post},
    Json, Router,
};
use std::sync::Arc;
use studyhub_common::{
    error::StudyHubResult,
    models::{JoinRequest, Membership},
};
use uuid::Uuid;

use crate::{middleware::AuthContext, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests/{request_id}", delete(cancel_request))
        .route("/requests/{request_id}/approve", post(approve_request))
        .route("/requests/{request_id}/reject", post(reject_request))
}

/// POST /api/v1/requests/{request_id}/approve — Admin approves; the requester becomes a member.
async fn approve_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> StudyHubResult<Json<Membership>> {
    let membership = state.engine.approve_join_request(auth.user_id(), request_id).await?;
    Ok(Json(membership))
}

/// POST /api/v1/requests/{request_id}/reject
async fn reject_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> StudyHubResult<Json<JoinRequest>> {
    let request = state.engine.reject_join_request(auth.user_id(), request_id).await?;
    Ok(Json(request))
}

/// DELETE /api/v1/requests/{request_id} — The requester withdraws a pending request.
async fn cancel_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> StudyHubResult<Json<JoinRequest>> {
    let request = state.engine.cancel_join_request(auth.user_id(), request_id).await?;
    Ok(Json(request))
}
