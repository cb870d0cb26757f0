//! Live status lookups for individual channels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helix_client::{HelixClient, HelixError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Live status of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiveStatus {
    /// Channel is currently live.
    Live {
        /// Stream title.
        title: String,
        /// Game or category (if available).
        category: Option<String>,
        /// Viewer count (if available).
        viewer_count: Option<u64>,
        /// Stream start time (if available).
        started_at: Option<DateTime<Utc>>,
    },
    /// Channel is offline.
    Offline,
}

impl LiveStatus {
    /// Shorthand for a live status with only a title.
    pub fn live(title: impl Into<String>) -> Self {
        LiveStatus::Live {
            title: title.into(),
            category: None,
            viewer_count: None,
            started_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live { .. })
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            LiveStatus::Live { title, .. } => Some(title),
            LiveStatus::Offline => None,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            LiveStatus::Live { category, .. } => category.as_deref(),
            LiveStatus::Offline => None,
        }
    }
}

/// A failed status lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Timeout, network failure, 5xx or malformed response. Retry next cycle.
    #[error("transient query error: {0}")]
    Transient(String),
    /// The access credential was rejected; re-authenticate before retrying.
    #[error("credential rejected: {0}")]
    Credential(String),
}

impl QueryError {
    pub fn is_credential(&self) -> bool {
        matches!(self, QueryError::Credential(_))
    }
}

impl From<HelixError> for QueryError {
    fn from(err: HelixError) -> Self {
        if err.is_unauthorized() {
            QueryError::Credential(err.to_string())
        } else {
            QueryError::Transient(err.to_string())
        }
    }
}

/// Source of channel live status.
///
/// "Offline" is a successful answer, never an error.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn check(&self, channel: &str, token: &str) -> Result<LiveStatus, QueryError>;
}

/// Status source backed by the Helix `streams` endpoint.
pub struct HelixStatusSource {
    client: HelixClient,
}

impl HelixStatusSource {
    pub fn new(client: HelixClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusSource for HelixStatusSource {
    async fn check(&self, channel: &str, token: &str) -> Result<LiveStatus, QueryError> {
        let status = match self.client.get_stream(channel, token).await? {
            Some(stream) => LiveStatus::Live {
                title: stream.title,
                category: stream.game_name.filter(|g| !g.is_empty()),
                viewer_count: stream.viewer_count,
                started_at: stream.started_at,
            },
            None => LiveStatus::Offline,
        };

        debug!(channel = %channel, live = status.is_live(), "Checked channel status");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HelixStatusSource {
        let client = helix_client::create_client_builder(Duration::from_secs(5))
            .build()
            .unwrap();
        HelixStatusSource::new(HelixClient::with_base_url(client, "cid", server.uri()))
    }

    #[test]
    fn test_live_status_accessors() {
        let live = LiveStatus::Live {
            title: "Ranked".to_string(),
            category: Some("Valorant".to_string()),
            viewer_count: Some(10),
            started_at: None,
        };
        assert!(live.is_live());
        assert_eq!(live.title(), Some("Ranked"));
        assert_eq!(live.category(), Some("Valorant"));

        assert!(!LiveStatus::Offline.is_live());
        assert_eq!(LiveStatus::Offline.title(), None);
    }

    #[test]
    fn test_helix_error_mapping() {
        let err: QueryError = HelixError::Unauthorized { status: 401 }.into();
        assert!(err.is_credential());

        let err: QueryError = HelixError::Timeout.into();
        assert!(matches!(err, QueryError::Transient(_)));
    }

    #[tokio::test]
    async fn test_helix_source_live_and_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/helix/streams"))
            .and(query_param("user_login", "foo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "user_login": "foo",
                    "user_name": "Foo",
                    "type": "live",
                    "title": "Ranked",
                    "game_name": "",
                    "viewer_count": 12
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/helix/streams"))
            .and(query_param("user_login", "bar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let source = source(&server);
        let foo = source.check("foo", "tok").await.unwrap();
        assert_eq!(foo.title(), Some("Ranked"));
        assert_eq!(foo.category(), None);

        assert_eq!(source.check("bar", "tok").await.unwrap(), LiveStatus::Offline);
    }

    #[tokio::test]
    async fn test_helix_source_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/helix/streams"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = source(&server).check("foo", "expired").await.unwrap_err();
        assert!(err.is_credential());
    }
}
