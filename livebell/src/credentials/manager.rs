//! Cached access token with refresh-on-demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::error::CredentialError;
use super::provider::{AccessToken, CredentialProvider};

/// Refresh tokens this long before they expire.
const DEFAULT_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Holds the current access token for the status source.
pub struct TokenManager {
    provider: Arc<dyn CredentialProvider>,
    token: RwLock<Option<AccessToken>>,
    /// Serializes refreshes so concurrent callers do not stampede the token endpoint.
    refresh_lock: Mutex<()>,
    refresh_margin: Duration,
    refresh_attempts: AtomicU64,
}

impl TokenManager {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self::with_refresh_margin(provider, Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS))
    }

    pub fn with_refresh_margin(provider: Arc<dyn CredentialProvider>, refresh_margin: Duration) -> Self {
        Self {
            provider,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_margin,
            refresh_attempts: AtomicU64::new(0),
        }
    }

    /// Obtain the first token at startup.
    ///
    /// Failure here means polling cannot begin at all.
    pub async fn acquire_initial(&self) -> Result<AccessToken, CredentialError> {
        let token = self.refresh().await?;
        info!(expires_at = ?token.expires_at, "Obtained initial access token");
        Ok(token)
    }

    /// The cached token, refreshed first if it is close to expiry.
    ///
    /// If a proactive refresh fails while the cached token is still valid,
    /// the cached token is returned.
    pub async fn current(&self) -> Result<AccessToken, CredentialError> {
        let now = Utc::now();
        let cached = self.token.read().clone();

        match cached {
            Some(token) if !token.is_expiring(now, self.refresh_margin) => Ok(token),
            Some(token) if !token.is_expired(now) => match self.refresh().await {
                Ok(fresh) => Ok(fresh),
                Err(e) => {
                    warn!(error = %e, "Proactive token refresh failed, using cached token");
                    Ok(token)
                }
            },
            _ => self.refresh().await,
        }
    }

    /// Fetch a new token unconditionally and cache it.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<AccessToken, CredentialError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_attempts.fetch_add(1, Ordering::Relaxed);

        debug!("Refreshing access token");
        let token = self.provider.fetch_token().await?;
        *self.token.write() = Some(token.clone());
        Ok(token)
    }

    /// Number of token fetches attempted so far, successful or not.
    pub fn refresh_attempts(&self) -> u64 {
        self.refresh_attempts.load(Ordering::Relaxed)
    }

}
