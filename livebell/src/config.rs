//! Runtime configuration loaded from environment variables.
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`
//! - `TWITCH_CLIENT_ID`
//! - `TWITCH_CLIENT_SECRET`
//!
//! Optional (defaults in parentheses):
//! - `LIVEBELL_DATA_FILE` (`data.json`)
//! - `LIVEBELL_CHECK_INTERVAL_SECS` (60)
//! - `LIVEBELL_REQUEST_TIMEOUT_SECS` (10)
//! - `LIVEBELL_MAX_CONCURRENT_CHECKS` (4)
//! - `LIVEBELL_RATE_LIMIT_RPS` (10)
//! - `LIVEBELL_NOTIFY_ON_FIRST_CHECK` (true)
//! - `LIVEBELL_LOG_DIR` (unset, console only)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::monitor::UnknownPolicy;
use crate::{Error, Result};

pub const DEFAULT_DATA_FILE: &str = "data.json";
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = helix_client::DEFAULT_REQUEST_TIMEOUT.as_secs();
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 4;
pub const DEFAULT_RATE_LIMIT_RPS: f64 = 10.0;

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    pub data_file: PathBuf,
    pub check_interval: Duration,
    pub request_timeout: Duration,
    pub max_concurrent_checks: usize,
    pub rate_limit_rps: f64,
    pub unknown_policy: UnknownPolicy,
    pub log_dir: Option<PathBuf>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_bot_token", &"<redacted>")
            .field("twitch_client_id", &self.twitch_client_id)
            .field("twitch_client_secret", &"<redacted>")
            .field("data_file", &self.data_file)
            .field("check_interval", &self.check_interval)
            .field("request_timeout", &self.request_timeout)
            .field("max_concurrent_checks", &self.max_concurrent_checks)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("unknown_policy", &self.unknown_policy)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::config(format!("missing required variable {key}")))
        };

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let twitch_client_id = required("TWITCH_CLIENT_ID")?;
        let twitch_client_secret = required("TWITCH_CLIENT_SECRET")?;

        let data_file = lookup("LIVEBELL_DATA_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));

        let check_interval_secs = parse_or(
            &lookup,
            "LIVEBELL_CHECK_INTERVAL_SECS",
            DEFAULT_CHECK_INTERVAL_SECS,
        )
        .max(1);
        let request_timeout_secs = parse_or(
            &lookup,
            "LIVEBELL_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );
        let max_concurrent_checks = parse_or(
            &lookup,
            "LIVEBELL_MAX_CONCURRENT_CHECKS",
            DEFAULT_MAX_CONCURRENT_CHECKS,
        )
        .max(1);

        let mut rate_limit_rps = parse_or(&lookup, "LIVEBELL_RATE_LIMIT_RPS", DEFAULT_RATE_LIMIT_RPS);
        if !rate_limit_rps.is_finite() || rate_limit_rps <= 0.0 {
            warn!(value = rate_limit_rps, "LIVEBELL_RATE_LIMIT_RPS must be positive; using default");
            rate_limit_rps = DEFAULT_RATE_LIMIT_RPS;
        }

        let unknown_policy = if parse_or(&lookup, "LIVEBELL_NOTIFY_ON_FIRST_CHECK", true) {
            UnknownPolicy::TreatAsOffline
        } else {
            UnknownPolicy::Baseline
        };

        let log_dir = lookup("LIVEBELL_LOG_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            telegram_bot_token,
            twitch_client_id,
            twitch_client_secret,
            data_file,
            check_interval: Duration::from_secs(check_interval_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_concurrent_checks,
            rate_limit_rps,
            unknown_policy,
            log_dir,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = %key, value = %raw, "Invalid value, falling back to default");
                default
            }
        },
        _ => default,
    }
}
