//! Account routes.

use axum::{
    extract::{Extension, State},
    routing::delete,
    Json, Router,
};
use std::sync::Arc;
use studyhub_common::error::StudyHubResult;
use studyhub_engine::AccountDeletionReport;

use crate::{identity::HostedIdentity, middleware::AuthContext, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/account", delete(delete_account))
}

/// DELETE /api/v1/account — Delete the caller's account and everything it owns.
///
/// The report is returned even when the identity was retained or needs a fresh
/// sign-in; clients read `identity` to decide what to tell the user.
async fn delete_account(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> StudyHubResult<Json<AccountDeletionReport>> {
    let identity = HostedIdentity::new(
        state.http.clone(),
        state.identity_url.clone(),
        auth.token.clone(),
        auth.identity.clone(),
    );
    let report = state.engine.delete_user_account(&identity).await?;
    tracing::info!(
        user_id = %report.user_id,
        identity = ?report.identity,
        communities_deleted = report.communities_deleted,
        "Account deletion finished"
    );
    Ok(Json(report))
}
