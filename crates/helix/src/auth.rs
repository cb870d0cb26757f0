//! OAuth client-credentials flow for app access tokens.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::client::check_status;
use crate::error::HelixError;

pub const DEFAULT_ID_BASE: &str = "https://id.twitch.tv";

/// An app access token as returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AppAccessToken {
    #[serde(default)]
    pub access_token: String,
    /// Lifetime in seconds, if the server reported one.
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    id_base: String,
}

impl AuthClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_ID_BASE)
    }

    pub fn with_base_url(client: Client, id_base: impl Into<String>) -> Self {
        Self {
            client,
            id_base: id_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch an app access token with the client-credentials grant.
    pub async fn fetch_app_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<AppAccessToken, HelixError> {
        let url = format!("{}/oauth2/token", self.id_base);
        debug!(url = %url, "requesting app access token");

        let response = self
            .client
            .post(&url)
            .query(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let body = check_status(response).await?.bytes().await?;
        let token: AppAccessToken = serde_json::from_slice(&body)?;

        if token.access_token.is_empty() {
            return Err(HelixError::MissingToken);
        }

        debug!(expires_in = ?token.expires_in, "app access token issued");
        Ok(token)
    }
}
