//! Access token sources.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use helix_client::AuthClient;

use super::error::CredentialError;

/// A bearer token with an optional expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Whether the token expires within `margin` of `now`.
    ///
    /// Tokens without a known expiry never count as expiring.
    pub fn is_expiring(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.is_some_and(|at| at - margin <= now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of fresh access tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Client-credentials token provider backed by the Twitch OAuth endpoint.
pub struct HelixCredentialProvider {
    auth: AuthClient,
    client_id: String,
    client_secret: String,
}

impl HelixCredentialProvider {
    pub fn new(
        auth: AuthClient,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for HelixCredentialProvider {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        let token = self
            .auth
            .fetch_app_token(&self.client_id, &self.client_secret)
            .await?;

        // Lifetimes too large to represent are treated as unknown.
        let expires_at = token
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        Ok(AccessToken::new(token.access_token, expires_at))
    }
}
