//! Saved CLI credentials

use serde::{Deserialize, Serialize};

/// Credentials saved by `oisp login`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// User token string, resolved again through `/auth/tokenInfo` on use
    #[serde(default)]
    pub token: String,

    /// Username (email) the token was issued to
    #[serde(default)]
    pub username: String,
}

impl AuthConfig {
    /// Check if a token is saved
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    /// Check if the saved token is a JWT past its expiry.
    /// Opaque tokens are left for the service to judge.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        crate::auth::is_jwt_expired(&self.token)
    }

    /// Clear authentication data
    pub fn clear(&mut self) {
        self.token.clear();
        self.username.clear();
    }
}
