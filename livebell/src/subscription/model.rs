//! Subscription data model.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// Twitch login names: 1-25 characters of lowercase letters, digits and underscores.
static CHANNEL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,25}$").expect("valid channel regex"));

/// A normalized channel login.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    /// Parse user input into a channel name.
    ///
    /// Accepts `name`, `@name` and `twitch.tv/name` URLs in any case.
    pub fn parse(input: &str) -> Result<Self> {
        let mut name = input.trim();
        for prefix in ["https://", "http://", "www.", "twitch.tv/", "@"] {
            if name
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            {
                name = &name[prefix.len()..];
            }
        }
        let name = name.trim_end_matches('/').to_lowercase();

        if !CHANNEL_NAME_RE.is_match(&name) {
            return Err(Error::validation(format!("invalid channel name: {input}")));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscriber id → set of channel names.
///
/// Serialized as a JSON object of string arrays: `{"100": ["foo", "bar"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subscriptions(BTreeMap<String, BTreeSet<String>>);

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every stored channel through [`ChannelName::parse`], dropping
    /// entries that are not valid channel names.
    ///
    /// Applied to data read from disk, which may have been edited by hand.
    pub fn normalize(self) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(subscriber, channels)| {
                    let channels = channels
                        .into_iter()
                        .filter_map(|raw| match ChannelName::parse(&raw) {
                            Ok(channel) => Some(channel.as_str().to_string()),
                            Err(_) => {
                                warn!(subscriber = %subscriber, channel = %raw, "Dropping invalid stored channel name");
                                None
                            }
                        })
                        .collect();
                    (subscriber, channels)
                })
                .collect(),
        )
    }

    /// Add a channel; returns `false` if it was already present.
    pub fn add(&mut self, subscriber: &str, channel: &ChannelName) -> bool {
        self.0
            .entry(subscriber.to_string())
            .or_default()
            .insert(channel.as_str().to_string())
    }

    /// Remove a channel; returns `false` if it was not present.
    ///
    /// The subscriber entry is kept even when its set becomes empty.
    pub fn remove(&mut self, subscriber: &str, channel: &ChannelName) -> bool {
        self.0
            .get_mut(subscriber)
            .is_some_and(|channels| channels.remove(channel.as_str()))
    }

    pub fn channels_of(&self, subscriber: &str) -> Vec<String> {
        self.0
            .get(subscriber)
            .map(|channels| channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    /// Channel → subscribers, with one entry per distinct channel.
    pub fn inverse_index(&self) -> BTreeMap<String, Vec<String>> {
        let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (subscriber, channels) in &self.0 {
            for channel in channels {
                index
                    .entry(channel.clone())
                    .or_default()
                    .push(subscriber.clone());
            }
        }
        index
    }
}

impl FromIterator<(String, Vec<String>)> for Subscriptions {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(subscriber, channels)| (subscriber, channels.into_iter().collect()))
                .collect(),
        )
    }
}
