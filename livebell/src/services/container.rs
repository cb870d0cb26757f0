//! Service container.
//!
//! Builds every service from an [`AppConfig`], starts the background tasks
//! and stops them again on shutdown.

use std::sync::Arc;
use std::time::Duration;

use helix_client::{AuthClient, HelixClient};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bot::{CommandHandler, UpdatePoller};
use crate::config::AppConfig;
use crate::credentials::{HelixCredentialProvider, TokenManager};
use crate::monitor::{HelixStatusSource, RateLimiterConfig, StreamMonitor, StreamMonitorConfig};
use crate::notification::{DEFAULT_TELEGRAM_API_BASE, Notifier, TelegramChannel, TelegramConfig};
use crate::subscription::{JsonFileStore, SubscriptionService};
use crate::{Error, Result};

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time a status query may take beyond the HTTP request timeout.
const QUERY_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Base URLs of the external APIs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub twitch_id: String,
    pub twitch_api: String,
    pub telegram_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            twitch_id: helix_client::DEFAULT_ID_BASE.to_string(),
            twitch_api: helix_client::DEFAULT_API_BASE.to_string(),
            telegram_api: DEFAULT_TELEGRAM_API_BASE.to_string(),
        }
    }
}

/// Holds all application services.
pub struct ServiceContainer {
    pub config: AppConfig,
    pub subscriptions: Arc<SubscriptionService>,
    pub tokens: Arc<TokenManager>,
    pub notifier: Arc<Notifier>,
    pub telegram: Arc<TelegramChannel>,
    http: Client,
    helix: HelixClient,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build all services against the public APIs. Performs no network I/O.
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_endpoints(config, Endpoints::default())
    }

    /// Build all services against the given API base URLs.
    pub fn with_endpoints(config: AppConfig, endpoints: Endpoints) -> Result<Self> {
        let http = helix_client::create_client_builder(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        let helix = HelixClient::with_base_url(
            http.clone(),
            config.twitch_client_id.clone(),
            endpoints.twitch_api,
        );
        let provider = HelixCredentialProvider::new(
            AuthClient::with_base_url(http.clone(), endpoints.twitch_id),
            config.twitch_client_id.clone(),
            config.twitch_client_secret.clone(),
        );
        let tokens = Arc::new(TokenManager::new(Arc::new(provider)));

        let store = JsonFileStore::new(config.data_file.clone());
        let subscriptions = Arc::new(SubscriptionService::new(Arc::new(store)));

        let telegram = Arc::new(TelegramChannel::new(
            TelegramConfig {
                api_base: endpoints.telegram_api,
                ..TelegramConfig::new(config.telegram_bot_token.clone())
            },
            http.clone(),
        ));
        let notifier = Arc::new(Notifier::new(telegram.clone()));

        info!(data_file = %config.data_file.display(), "Service container initialized");

        Ok(Self {
            config,
            subscriptions,
            tokens,
            notifier,
            telegram,
            http,
            helix,
            tasks: Mutex::new(Vec::new()),
            cancellation_token: CancellationToken::new(),
        })
    }

    fn monitor_config(&self) -> Result<StreamMonitorConfig> {
        Ok(StreamMonitorConfig {
            interval: self.config.check_interval,
            max_concurrent_checks: self.config.max_concurrent_checks,
            query_timeout: self.config.request_timeout + QUERY_TIMEOUT_SLACK,
            unknown_policy: self.config.unknown_policy,
            rate_limit: RateLimiterConfig::with_rps(self.config.rate_limit_rps)?,
        })
    }

    /// Acquire the first access token and start the background tasks.
    ///
    /// Fails without starting anything if no token can be obtained.
    pub async fn start(&self) -> Result<()> {
        self.tokens.acquire_initial().await?;

        let monitor = StreamMonitor::new(
            self.subscriptions.clone(),
            Arc::new(HelixStatusSource::new(self.helix.clone())),
            self.tokens.clone(),
            self.notifier.clone(),
            self.monitor_config()?,
        );

        let poller = UpdatePoller::new(
            self.http.clone(),
            self.telegram.config().clone(),
            Arc::new(CommandHandler::new(self.subscriptions.clone())),
            self.telegram.clone(),
        );

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(monitor.run(self.cancellation_token.child_token())));
        tasks.push(tokio::spawn(poller.run(self.cancellation_token.child_token())));

        info!("Background services started");
        Ok(())
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) {
        info!("Shutting down services (timeout: {:?})", timeout);
        self.cancellation_token.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let joined = tokio::time::timeout(timeout, futures::future::join_all(tasks)).await;

        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "Background task ended abnormally");
                    }
                }
            }
            Err(_) => warn!("Shutdown timeout reached, forcing shutdown"),
        }

        info!("Services shut down");
    }

    /// Number of background tasks started and not yet shut down.
    pub fn running_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
