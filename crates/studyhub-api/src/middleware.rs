//! Middleware: bearer-token authentication and security headers.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use studyhub_common::{auth, error::StudyHubError, models::Identity};

use crate::AppState;

/// Authenticated caller, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    /// The raw bearer token, forwarded to the hosted auth service when needed.
    pub token: String,
}

impl AuthContext {
    pub fn user_id(&self) -> uuid::Uuid {
        self.identity.uid
    }
}

/// Extract and validate the JWT from the `Authorization: Bearer <token>` header.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StudyHubError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StudyHubError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StudyHubError::Unauthorized)?;

    let claims = auth::validate_token(token, &state.jwt_secret).map_err(|_| StudyHubError::InvalidToken)?;
    let identity = claims.identity().ok_or(StudyHubError::InvalidToken)?;

    let auth_ctx = AuthContext {
        identity,
        token: token.to_string(),
    };
    request.extensions_mut().insert(auth_ctx);

    Ok(next.run(request).await)
}

/// Add security headers to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    h.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    h.insert(header::X_FRAME_OPTIONS, header::HeaderValue::from_static("DENY"));
    h.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    h.insert(
        header::CONTENT_SECURITY_POLICY,
        header::HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    response
}
