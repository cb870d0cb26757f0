//! Telegram Bot API delivery channel.
//!
//! Sends messages via `POST /bot<token>/sendMessage`. Handles 429 rate
//! limits by respecting the `parameters.retry_after` field returned in the
//! JSON response body.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{DeliveryChannel, DeliveryError};

/// Maximum number of attempts for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Longest `retry_after` we are willing to sleep on; longer waits fail the send.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Telegram Bot API token.
    pub bot_token: String,
    /// API base URL, overridable for tests or a local Bot API server.
    pub api_base: String,
    /// Show the link preview of the stream URL.
    pub link_preview: bool,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            link_preview: true,
        }
    }

    /// Base URL for Bot API methods: `<api_base>/bot<token>`.
    pub fn bot_url(&self) -> String {
        format!("{}/bot{}", self.api_base.trim_end_matches('/'), self.bot_token)
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("link_preview", &self.link_preview)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Telegram delivery channel.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn build_payload(&self, recipient: &str, text: &str) -> serde_json::Value {
        // Numeric chat ids are sent as integers, `@channelusername` as-is.
        let chat_id = match recipient.parse::<i64>() {
            Ok(id) => json!(id),
            Err(_) => json!(recipient),
        };

        json!({
            "chat_id": chat_id,
            "text": truncate_message(text, TELEGRAM_MESSAGE_LIMIT),
            "link_preview_options": { "is_disabled": !self.config.link_preview },
        })
    }

    /// Send request with rate limit handling.
    async fn send_with_retry(&self, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        let url = format!("{}/sendMessage", self.config.bot_url());
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&url)
                .json(payload)
                .send()
                .await
                .map_err(|e| DeliveryError::Request(e.without_url().to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let body: ApiErrorBody = response.json().await.unwrap_or_default();

            if status.as_u16() == 429 {
                let retry_after = body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Telegram rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(DeliveryError::RateLimited { attempts });
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                if wait_duration > MAX_RETRY_WAIT {
                    warn!(
                        "Telegram rate limit: retry_after {:?} exceeds {:?}, giving up",
                        wait_duration, MAX_RETRY_WAIT
                    );
                    return Err(DeliveryError::RateLimited { attempts });
                }
                debug!(
                    "Telegram rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: body.description.unwrap_or_else(|| status.to_string()),
            });
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), DeliveryError> {
        let payload = self.build_payload(recipient, text);
        self.send_with_retry(&payload).await?;
        debug!(recipient = %recipient, "Telegram message sent");
        Ok(())
    }
}

/// Truncate a message to fit within the Telegram character limit.
fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "\n\n[truncated]";
    let budget = limit - suffix.len();
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{suffix}")
}
