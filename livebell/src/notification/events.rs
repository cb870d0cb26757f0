//! Notification payloads.

use serde::{Deserialize, Serialize};

use crate::monitor::LiveStatus;

/// A channel went live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveNotification {
    pub channel: String,
    pub title: String,
    pub category: Option<String>,
}

impl LiveNotification {
    pub fn new(channel: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            title: title.into(),
            category: None,
        }
    }

    /// Build from an observed status; `None` if the status is not live.
    pub fn from_status(channel: &str, status: &LiveStatus) -> Option<Self> {
        match status {
            LiveStatus::Live {
                title, category, ..
            } => Some(Self {
                channel: channel.to_string(),
                title: title.clone(),
                category: category.clone(),
            }),
            LiveStatus::Offline => None,
        }
    }

    pub fn url(&self) -> String {
        format!("https://twitch.tv/{}", self.channel)
    }

    /// Plain-text message body.
    pub fn render(&self) -> String {
        let mut text = format!("\u{1f534} {} is live!\n", self.channel); // 🔴
        if !self.title.is_empty() {
            text.push_str(&format!("\u{1f3ae} {}\n", self.title)); // 🎮
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            text.push_str(&format!("\u{1f4c2} {}\n", category)); // 📂
        }
        text.push_str(&self.url());
        text
    }
}
