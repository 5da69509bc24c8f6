//! Bearer token claims issued by the hosted authentication service.
//!
//! StudyHub never issues tokens; it only verifies them with the shared secret
//! and turns the claims into an [`Identity`].

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Identity;

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as string)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Convert verified claims into the identity the engine works with.
    pub fn identity(&self) -> Option<Identity> {
        let uid = self.sub.parse::<Uuid>().ok()?;
        Some(Identity {
            uid,
            email: self.email.clone(),
            display_name: self.name.clone(),
            photo_url: self.picture.clone(),
        })
    }
}

/// Validate and decode a token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
