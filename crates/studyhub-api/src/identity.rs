//! Client for the hosted authentication service's account API.

use async_trait::async_trait;
use reqwest::StatusCode;
use studyhub_common::error::IdentityFailure;
use studyhub_common::models::Identity;
use studyhub_engine::IdentityService;

/// The caller's identity, backed by the hosted service and the caller's own token.
pub struct HostedIdentity {
    http: reqwest::Client,
    base_url: String,
    token: String,
    identity: Identity,
}

impl HostedIdentity {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>, identity: Identity) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            identity,
        }
    }

    fn account_url(&self) -> String {
        format!("{}/v1/accounts/{}", self.base_url.trim_end_matches('/'), self.identity.uid)
    }
}

/// Map the account API's delete response onto identity failure cases.
pub fn classify(status: StatusCode) -> Result<(), IdentityFailure> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IdentityFailure::RequiresRecentLogin),
        StatusCode::NOT_FOUND => Err(IdentityFailure::UserNotFound),
        StatusCode::TOO_MANY_REQUESTS => Err(IdentityFailure::TooManyRequests),
        other => Err(IdentityFailure::Other(format!("unexpected status {other}"))),
    }
}

#[async_trait]
impl IdentityService for HostedIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        Some(self.identity.clone())
    }

    async fn delete_current_identity(&self) -> Result<(), IdentityFailure> {
        let response = self
            .http
            .delete(self.account_url())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| IdentityFailure::Other(e.to_string()))?;
        classify(response.status())
    }
}
