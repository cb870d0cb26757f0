//! Delivery channels.

mod telegram;

pub use telegram::{DEFAULT_TELEGRAM_API_BASE, TelegramChannel, TelegramConfig};

use async_trait::async_trait;
use thiserror::Error;

/// A failed delivery to one recipient.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The API refused the message (blocked bot, unknown chat, bad request).
    #[error("rejected with status {status}: {description}")]
    Rejected { status: u16, description: String },

    /// Still rate limited after the retry budget was spent.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Network failure or unexpected response.
    #[error("request failed: {0}")]
    Request(String),
}

/// Sends text to a single recipient.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Deliver `text` to `recipient`.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), DeliveryError>;
}
