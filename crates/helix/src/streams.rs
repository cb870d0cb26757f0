//! `GET /helix/streams` lookups.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::client::check_status;
use crate::error::HelixError;

pub const DEFAULT_API_BASE: &str = "https://api.twitch.tv";

/// A live stream entry from the Helix `streams` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(default)]
    pub id: String,
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub viewer_count: Option<u64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// `"live"` for live streams; empty on errors.
    #[serde(default, rename = "type")]
    pub stream_type: String,
}

impl Stream {
    pub fn is_live(&self) -> bool {
        self.stream_type.is_empty() || self.stream_type == "live"
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

/// Helix API client bound to one application client id.
#[derive(Debug, Clone)]
pub struct HelixClient {
    client: Client,
    api_base: String,
    client_id: String,
}

impl HelixClient {
    pub fn new(client: Client, client_id: impl Into<String>) -> Self {
        Self::with_base_url(client, client_id, DEFAULT_API_BASE)
    }

    pub fn with_base_url(
        client: Client,
        client_id: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
        }
    }

    /// Look up the current stream of `login`.
    ///
    /// Returns `Ok(None)` when the channel is offline; that is not an error.
    pub async fn get_stream(&self, login: &str, token: &str) -> Result<Option<Stream>, HelixError> {
        let url = format!("{}/helix/streams", self.api_base);
        trace!(login = %login, "querying helix streams");

        let response = self
            .client
            .get(&url)
            .query(&[("user_login", login)])
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .send()
            .await?;

        let body = check_status(response).await?.bytes().await?;
        let page: Page<Stream> = serde_json::from_slice(&body)?;

        let stream = page.data.into_iter().find(|s| s.is_live());
        debug!(login = %login, live = stream.is_some(), "helix stream status");
        Ok(stream)
    }
}
