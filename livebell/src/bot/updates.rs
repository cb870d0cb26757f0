//! Telegram `getUpdates` long polling.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::{Command, CommandHandler};
use crate::notification::{DeliveryChannel, TelegramConfig};
use crate::{Error, Result};

/// Server-side wait of one `getUpdates` call.
pub const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed `getUpdates` call.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
}

/// Receives chat messages and answers commands.
pub struct UpdatePoller {
    client: Client,
    config: TelegramConfig,
    handler: Arc<CommandHandler>,
    replies: Arc<dyn DeliveryChannel>,
    bot_username: Option<String>,
    offset: i64,
    poll_timeout: Duration,
}

impl UpdatePoller {
    pub fn new(
        client: Client,
        config: TelegramConfig,
        handler: Arc<CommandHandler>,
        replies: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            client,
            config,
            handler,
            replies,
            bot_username: None,
            offset: 0,
            poll_timeout: LONG_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Next update id to request.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let url = format!("{}/{}", self.config.bot_url(), method);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Telegram(e.without_url().to_string()))?;

        let status = response.status();
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Telegram(format!("{method}: invalid response ({status}): {}", e.without_url())))?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(Error::Telegram(format!(
                "{method} failed ({status}): {}",
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// Ask Telegram for the bot's own username.
    pub async fn fetch_bot_username(&self) -> Result<Option<String>> {
        let me: BotUser = self
            .call("getMe", json!({}), Duration::from_secs(10))
            .await?;
        Ok(me.username)
    }

    /// Fetch one batch of updates and answer every command in it.
    ///
    /// Returns the number of updates consumed.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let body = json!({
            "offset": self.offset,
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self
            .call("getUpdates", body, self.poll_timeout + Duration::from_secs(10))
            .await?;

        let count = updates.len();
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            self.dispatch(update).await;
        }
        Ok(count)
    }

    async fn dispatch(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let Some(command) = Command::parse(text, self.bot_username.as_deref()) else {
            return;
        };

        let chat_id = message.chat.id.to_string();
        let reply = self.handler.handle(&chat_id, &command).await;
        if let Err(e) = self.replies.send_text(&chat_id, &reply).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to send command reply");
        }
    }

    /// Poll until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        if self.bot_username.is_none() {
            match self.fetch_bot_username().await {
                Ok(username) => self.bot_username = username,
                Err(e) => warn!(error = %e, "Could not fetch bot username, accepting all /cmd@bot mentions"),
            }
        }
        info!(bot = ?self.bot_username, "Telegram update poller started");

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(count) => {
                    if count > 0 {
                        debug!(count, offset = self.offset, "Processed Telegram updates");
                    }
                }
                Err(e) => {
                    warn!(error = %e, backoff = ?ERROR_BACKOFF, "getUpdates failed");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Telegram update poller stopped");
    }
}
