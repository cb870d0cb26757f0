//! The poll loop.
//!
//! Each cycle reads a fresh subscription snapshot, queries every distinct
//! channel once, feeds the observations into the [`LivenessTracker`] and
//! notifies subscribers of channels that went live. Between cycles the
//! monitor is idle until the interval elapses or shutdown is requested.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credentials::TokenManager;
use crate::notification::{LiveNotification, Notifier};
use crate::subscription::SubscriptionService;

use super::detector::{LiveStatus, QueryError, StatusSource};
use super::rate_limiter::{RateLimiter, RateLimiterConfig};
use super::tracker::{LivenessTracker, Transition, UnknownPolicy};

/// Configuration for the stream monitor.
#[derive(Debug, Clone)]
pub struct StreamMonitorConfig {
    /// Time between the starts of two cycles.
    pub interval: Duration,
    /// Maximum status queries in flight at once.
    pub max_concurrent_checks: usize,
    /// Upper bound on a single status query.
    pub query_timeout: Duration,
    /// Treatment of channels seen for the first time.
    pub unknown_policy: UnknownPolicy,
    pub rate_limit: RateLimiterConfig,
}

impl Default for StreamMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_concurrent_checks: 4,
            query_timeout: Duration::from_secs(10),
            unknown_policy: UnknownPolicy::default(),
            rate_limit: RateLimiterConfig::default(),
        }
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Waiting for the next tick.
    Idle,
    /// Polling channels.
    Cycling,
}

/// Why a cycle was abandoned without touching liveness state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    SubscriptionsUnavailable(String),
    CredentialUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Skipped(SkipReason),
}

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Distinct channels with a successful observation.
    pub channels_checked: usize,
    /// Channels without an observation this cycle.
    pub query_failures: usize,
    /// Channels that went live.
    pub went_live: usize,
    /// Channels that went offline.
    pub went_offline: usize,
    /// Messages delivered.
    pub notified: usize,
    /// Messages that failed to deliver.
    pub delivery_failures: usize,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    fn completed() -> Self {
        Self {
            channels_checked: 0,
            query_failures: 0,
            went_live: 0,
            went_offline: 0,
            notified: 0,
            delivery_failures: 0,
            outcome: CycleOutcome::Completed,
        }
    }

    fn skipped(reason: SkipReason) -> Self {
        Self {
            outcome: CycleOutcome::Skipped(reason),
            ..Self::completed()
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Skipped(_))
    }
}

type QueryResults = BTreeMap<String, Result<LiveStatus, QueryError>>;

/// The stream monitor. Owns the liveness tracker exclusively.
pub struct StreamMonitor {
    subscriptions: Arc<SubscriptionService>,
    source: Arc<dyn StatusSource>,
    tokens: Arc<TokenManager>,
    notifier: Arc<Notifier>,
    rate_limiter: RateLimiter,
    tracker: LivenessTracker,
    state: MonitorState,
    config: StreamMonitorConfig,
}

impl StreamMonitor {
    pub fn new(
        subscriptions: Arc<SubscriptionService>,
        source: Arc<dyn StatusSource>,
        tokens: Arc<TokenManager>,
        notifier: Arc<Notifier>,
        config: StreamMonitorConfig,
    ) -> Self {
        Self {
            subscriptions,
            source,
            tokens,
            notifier,
            rate_limiter: RateLimiter::new(config.rate_limit.clone()),
            tracker: LivenessTracker::new(config.unknown_policy),
            state: MonitorState::Idle,
            config,
        }
    }

    /// Read-only view of the liveness state.
    pub fn tracker(&self) -> &LivenessTracker {
        &self.tracker
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn config(&self) -> &StreamMonitorConfig {
        &self.config
    }

    /// Run cycles until `cancel` fires.
    ///
    /// The first cycle starts immediately. A cycle in progress is abandoned
    /// at its next await point on cancellation; tracker updates already made
    /// stay valid.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            interval = ?self.config.interval,
            max_concurrent = self.config.max_concurrent_checks,
            policy = ?self.config.unknown_policy,
            "Stream monitor started"
        );

        loop {
            let next_tick = Instant::now() + self.config.interval;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.run_cycle() => {}
            }
            self.state = MonitorState::Idle;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_tick) => {}
            }
        }

        info!(
            tracked = self.tracker.len(),
            live = self.tracker.live_count(),
            "Stream monitor stopped"
        );
    }

    /// Run exactly one cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.state = MonitorState::Cycling;
        let started = Instant::now();
        let report = self.cycle().await;
        self.state = MonitorState::Idle;

        let elapsed = started.elapsed();
        match &report.outcome {
            CycleOutcome::Skipped(reason) => {
                warn!(reason = ?reason, "Poll cycle skipped");
            }
            CycleOutcome::Completed
                if report.went_live > 0 || report.query_failures > 0 || report.delivery_failures > 0 =>
            {
                info!(
                    checked = report.channels_checked,
                    failed = report.query_failures,
                    went_live = report.went_live,
                    went_offline = report.went_offline,
                    notified = report.notified,
                    delivery_failures = report.delivery_failures,
                    elapsed = ?elapsed,
                    "Poll cycle finished"
                );
            }
            CycleOutcome::Completed => {
                debug!(
                    checked = report.channels_checked,
                    went_offline = report.went_offline,
                    elapsed = ?elapsed,
                    "Poll cycle finished"
                );
            }
        }

        report
    }

    async fn cycle(&mut self) -> CycleReport {
        let snapshot = match self.subscriptions.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return CycleReport::skipped(SkipReason::SubscriptionsUnavailable(e.to_string()));
            }
        };

        let index = snapshot.inverse_index();
        if index.is_empty() {
            debug!("No subscribed channels, nothing to check");
            return CycleReport::completed();
        }

        let attempts_before = self.tokens.refresh_attempts();
        let token = match self.tokens.current().await {
            Ok(token) => token,
            Err(e) => return CycleReport::skipped(SkipReason::CredentialUnavailable(e.to_string())),
        };
        // At most one token fetch per cycle, proactive or forced.
        let refreshed_this_cycle = self.tokens.refresh_attempts() != attempts_before;

        let mut results = self.query_channels(index.keys().cloned().collect(), &token.value).await;

        let rejected: Vec<String> = results
            .iter()
            .filter(|(_, r)| matches!(r, Err(e) if e.is_credential()))
            .map(|(channel, _)| channel.clone())
            .collect();

        if !rejected.is_empty() && refreshed_this_cycle {
            warn!(
                channels = rejected.len(),
                "Access token rejected after this cycle's refresh, not refreshing again"
            );
        } else if !rejected.is_empty() {
            warn!(
                channels = rejected.len(),
                "Access token rejected, refreshing once"
            );
            match self.tokens.refresh().await {
                Ok(fresh) => {
                    let retried = self.query_channels(rejected, &fresh.value).await;
                    results.extend(retried);
                }
                Err(e) => {
                    // Observations gathered with the rejected token are dropped too.
                    return CycleReport::skipped(SkipReason::CredentialUnavailable(e.to_string()));
                }
            }
        }

        let mut report = CycleReport::completed();

        for (channel, result) in results {
            let status = match result {
                Ok(status) => status,
                Err(e) => {
                    report.query_failures += 1;
                    warn!(channel = %channel, error = %e, "Status check failed, keeping last known state");
                    continue;
                }
            };
            report.channels_checked += 1;

            match self.tracker.observe(&channel, status.is_live()) {
                Transition::BecameLive => {
                    report.went_live += 1;
                    let Some(notification) = LiveNotification::from_status(&channel, &status) else {
                        continue;
                    };
                    let subscribers = index.get(&channel).map(Vec::as_slice).unwrap_or_default();
                    info!(
                        channel = %channel,
                        title = %notification.title,
                        subscribers = subscribers.len(),
                        "Channel went live"
                    );
                    let dispatch = self.notifier.notify(&notification, subscribers).await;
                    report.notified += dispatch.delivered;
                    report.delivery_failures += dispatch.failure_count();
                }
                Transition::BecameOffline => {
                    report.went_offline += 1;
                    info!(channel = %channel, "Channel went offline");
                }
                Transition::None => {}
            }
        }

        report
    }

    /// Query each channel once, at most `max_concurrent_checks` at a time.
    async fn query_channels(&self, channels: Vec<String>, token: &str) -> QueryResults {
        let source = &self.source;
        let limiter = &self.rate_limiter;
        let timeout = self.config.query_timeout;

        futures::stream::iter(channels)
            .map(|channel| async move {
                limiter.acquire().await;
                let result = match tokio::time::timeout(timeout, source.check(&channel, token)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(QueryError::Transient(format!(
                        "status check timed out after {:?}",
                        timeout
                    ))),
                };
                (channel, result)
            })
            .buffer_unordered(self.config.max_concurrent_checks.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::credentials::{AccessToken, CredentialError, CredentialProvider};
    use crate::notification::{DeliveryChannel, DeliveryError};
    use crate::subscription::{ChannelName, MemoryStore, SubscriptionStore, Subscriptions};

    /// Status source answering from a per-channel table.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<HashMap<String, Result<LiveStatus, QueryError>>>,
        rejected_tokens: Mutex<Vec<String>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSource {
        fn set(&self, channel: &str, response: Result<LiveStatus, QueryError>) {
            self.responses.lock().insert(channel.to_string(), response);
        }

        fn reject_token(&self, token: &str) {
            self.rejected_tokens.lock().push(token.to_string());
        }

        fn calls_for(&self, channel: &str) -> usize {
            self.calls.lock().iter().filter(|(c, _)| c == channel).count()
        }

        fn reset_calls(&self) {
            self.calls.lock().clear();
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn check(&self, channel: &str, token: &str) -> Result<LiveStatus, QueryError> {
            self.calls.lock().push((channel.to_string(), token.to_string()));
            if self.rejected_tokens.lock().iter().any(|t| t == token) {
                return Err(QueryError::Credential("401 Unauthorized".into()));
            }
            self.responses
                .lock()
                .get(channel)
                .cloned()
                .unwrap_or(Ok(LiveStatus::Offline))
        }
    }

    /// Issues `token-1`, `token-2`, ... and fails once `fail_from` is reached.
    struct SequenceProvider {
        issued: AtomicU32,
        fail_from: u32,
        lifetime: Option<chrono::Duration>,
    }

    #[async_trait]
    impl CredentialProvider for SequenceProvider {
        async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.fail_from {
                return Err(CredentialError::RequestFailed("token endpoint down".into()));
            }
            Ok(AccessToken::new(
                format!("token-{n}"),
                self.lifetime.map(|l| chrono::Utc::now() + l),
            ))
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, String)>>,
        failing: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeliveryChannel for Outbox {
        fn channel_type(&self) -> &'static str {
            "outbox"
        }

        async fn send_text(&self, recipient: &str, text: &str) -> Result<(), DeliveryError> {
            self.sent.lock().push((recipient.to_string(), text.to_string()));
            if self.failing.lock().iter().any(|r| r == recipient) {
                return Err(DeliveryError::Rejected {
                    status: 400,
                    description: "Bad Request: chat not found".into(),
                });
            }
            Ok(())
        }
    }

    impl Outbox {
        fn take(&self) -> Vec<(String, String)> {
            std::mem::take(&mut *self.sent.lock())
        }
    }

    struct Harness {
        monitor: StreamMonitor,
        source: Arc<ScriptedSource>,
        outbox: Arc<Outbox>,
        subscriptions: Arc<SubscriptionService>,
        tokens: Arc<TokenManager>,
    }

    async fn harness_with(policy: UnknownPolicy, token_fail_from: u32) -> Harness {
        let source = Arc::new(ScriptedSource::default());
        let outbox = Arc::new(Outbox::default());
        let subscriptions = Arc::new(SubscriptionService::new(Arc::new(MemoryStore::new())));
        let tokens = Arc::new(TokenManager::new(Arc::new(SequenceProvider {
            issued: AtomicU32::new(0),
            fail_from: token_fail_from,
            lifetime: None,
        })));
        tokens.acquire_initial().await.unwrap();

        let config = StreamMonitorConfig {
            interval: Duration::from_millis(20),
            unknown_policy: policy,
            ..Default::default()
        };
        let monitor = StreamMonitor::new(
            subscriptions.clone(),
            source.clone(),
            tokens.clone(),
            Arc::new(Notifier::new(outbox.clone())),
            config,
        );

        Harness {
            monitor,
            source,
            outbox,
            subscriptions,
            tokens,
        }
    }

    async fn harness() -> Harness {
        harness_with(UnknownPolicy::TreatAsOffline, u32::MAX).await
    }

    async fn subscribe(h: &Harness, subscriber: &str, channel: &str) {
        h.subscriptions
            .add(subscriber, &ChannelName::parse(channel).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_offline_live_live_notifies_once() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;
        assert_eq!(h.monitor.tracker().get("foo"), None);

        h.source.set("foo", Ok(LiveStatus::Offline));
        let report = h.monitor.run_cycle().await;
        assert_eq!(report.channels_checked, 1);
        assert!(h.outbox.take().is_empty());
        assert_eq!(h.monitor.tracker().get("foo"), Some(false));

        h.source.set("foo", Ok(LiveStatus::live("Ranked")));
        let report = h.monitor.run_cycle().await;
        assert_eq!(report.went_live, 1);
        let sent = h.outbox.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "100");
        assert!(sent[0].1.contains("foo"));
        assert!(sent[0].1.contains("Ranked"));
        assert_eq!(h.monitor.tracker().get("foo"), Some(true));

        let report = h.monitor.run_cycle().await;
        assert_eq!(report.went_live, 0);
        assert!(h.outbox.take().is_empty());
        assert_eq!(h.monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_shared_channel_queried_once_and_fanned_out() {
        let mut h = harness().await;
        subscribe(&h, "100", "bar").await;
        subscribe(&h, "200", "bar").await;

        h.source.set("bar", Ok(LiveStatus::Offline));
        h.monitor.run_cycle().await;
        h.source.reset_calls();

        h.source.set("bar", Ok(LiveStatus::live("Just chatting")));
        let report = h.monitor.run_cycle().await;

        assert_eq!(h.source.calls_for("bar"), 1);
        assert_eq!(report.notified, 2);
        let mut recipients: Vec<String> = h.outbox.take().into_iter().map(|(r, _)| r).collect();
        recipients.sort();
        assert_eq!(recipients, vec!["100".to_string(), "200".to_string()]);
    }

    #[tokio::test]
    async fn test_transient_error_keeps_last_known_state() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;

        h.source.set("foo", Ok(LiveStatus::live("Ranked")));
        h.monitor.run_cycle().await;
        assert_eq!(h.outbox.take().len(), 1);

        h.source.set("foo", Err(QueryError::Transient("503".into())));
        let report = h.monitor.run_cycle().await;
        assert_eq!(report.query_failures, 1);
        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(h.monitor.tracker().get("foo"), Some(true));

        // Still live after the hiccup: no second notification.
        h.source.set("foo", Ok(LiveStatus::live("Ranked")));
        h.monitor.run_cycle().await;
        assert!(h.outbox.take().is_empty());
    }

    #[tokio::test]
    async fn test_transient_error_leaves_unknown_channel_unknown() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;
        subscribe(&h, "100", "bar").await;

        h.source.set("foo", Err(QueryError::Transient("timeout".into())));
        h.source.set("bar", Ok(LiveStatus::Offline));
        let report = h.monitor.run_cycle().await;

        assert_eq!(report.channels_checked, 1);
        assert_eq!(report.query_failures, 1);
        assert_eq!(h.monitor.tracker().get("foo"), None);
        assert_eq!(h.monitor.tracker().get("bar"), Some(false));
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_and_retried() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;
        h.source.set("foo", Ok(LiveStatus::live("Ranked")));
        h.source.reject_token("token-1");

        let report = h.monitor.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.went_live, 1);
        assert_eq!(h.outbox.take().len(), 1);
        assert_eq!(h.tokens.current().await.unwrap().value, "token-2");
        let calls = h.source.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                ("foo".to_string(), "token-1".to_string()),
                ("foo".to_string(), "token-2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_skips_cycle_without_state_changes() {
        // token-1 is issued at startup, every later fetch fails.
        let mut h = harness_with(UnknownPolicy::TreatAsOffline, 2).await;
        subscribe(&h, "100", "foo").await;
        subscribe(&h, "200", "bar").await;

        h.source.set("foo", Ok(LiveStatus::Offline));
        h.source.set("bar", Ok(LiveStatus::Offline));
        h.monitor.run_cycle().await;

        // Only foo's query is rejected; bar's successful observation must not be applied.
        h.source.set("bar", Ok(LiveStatus::live("Ranked")));
        h.source.set("foo", Err(QueryError::Credential("401".into())));
        let report = h.monitor.run_cycle().await;

        assert!(report.is_skipped());
        assert!(matches!(
            report.outcome,
            CycleOutcome::Skipped(SkipReason::CredentialUnavailable(_))
        ));
        assert_eq!(h.monitor.tracker().get("bar"), Some(false));
        assert!(h.outbox.take().is_empty());
    }

    #[tokio::test]
    async fn test_persistent_credential_error_counts_as_query_failure() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;
        h.source.set("foo", Err(QueryError::Credential("403".into())));

        let report = h.monitor.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.query_failures, 1);
        assert_eq!(h.source.calls_for("foo"), 2);
        assert_eq!(h.monitor.tracker().get("foo"), None);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_roll_back_state() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;
        subscribe(&h, "200", "foo").await;
        h.outbox.failing.lock().push("100".to_string());

        h.source.set("foo", Ok(LiveStatus::live("Ranked")));
        let report = h.monitor.run_cycle().await;
        assert_eq!(report.notified, 1);
        assert_eq!(report.delivery_failures, 1);
        assert_eq!(h.outbox.take().len(), 2);
        assert_eq!(h.monitor.tracker().get("foo"), Some(true));

        // The missed message is not resent.
        h.monitor.run_cycle().await;
        assert!(h.outbox.take().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_reloaded_every_cycle() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;
        h.monitor.run_cycle().await;
        assert_eq!(h.source.calls_for("bar"), 0);

        subscribe(&h, "100", "bar").await;
        h.subscriptions
            .remove("100", &ChannelName::parse("foo").unwrap())
            .await
            .unwrap();
        h.source.reset_calls();

        h.source.set("bar", Ok(LiveStatus::live("New")));
        h.monitor.run_cycle().await;
        assert_eq!(h.source.calls_for("foo"), 0);
        assert_eq!(h.source.calls_for("bar"), 1);
        assert_eq!(h.outbox.take().len(), 1);
    }

    #[tokio::test]
    async fn test_baseline_policy_skips_channels_live_at_startup() {
        let mut h = harness_with(UnknownPolicy::Baseline, u32::MAX).await;
        subscribe(&h, "100", "foo").await;

        h.source.set("foo", Ok(LiveStatus::live("Already going")));
        let report = h.monitor.run_cycle().await;
        assert_eq!(report.went_live, 0);
        assert!(h.outbox.take().is_empty());

        h.source.set("foo", Ok(LiveStatus::Offline));
        h.monitor.run_cycle().await;
        h.source.set("foo", Ok(LiveStatus::live("Again")));
        h.monitor.run_cycle().await;
        assert_eq!(h.outbox.take().len(), 1);
    }

    #[tokio::test]
    async fn test_treat_as_offline_policy_notifies_channels_live_at_startup() {
        let mut h = harness().await;
        subscribe(&h, "100", "foo").await;

        h.source.set("foo", Ok(LiveStatus::live("Already going")));
        let report = h.monitor.run_cycle().await;
        assert_eq!(report.went_live, 1);
        assert_eq!(h.outbox.take().len(), 1);
    }

    #[tokio::test]
    async fn test_proactive_refresh_is_the_only_refresh_in_a_cycle() {
        let h = harness().await;
        subscribe(&h, "100", "foo").await;
        h.source.set("foo", Err(QueryError::Credential("401".into())));

        // Every token is inside the refresh margin, so `current()` refreshes.
        let provider = Arc::new(SequenceProvider {
            issued: AtomicU32::new(0),
            fail_from: u32::MAX,
            lifetime: Some(chrono::Duration::minutes(1)),
        });
        let tokens = Arc::new(TokenManager::new(provider.clone()));
        tokens.acquire_initial().await.unwrap();

        let mut monitor = StreamMonitor::new(
            h.subscriptions.clone(),
            h.source.clone(),
            tokens.clone(),
            Arc::new(Notifier::new(h.outbox.clone())),
            StreamMonitorConfig::default(),
        );
        let report = monitor.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.query_failures, 1);
        assert_eq!(provider.issued.load(Ordering::SeqCst), 2);
        assert_eq!(h.source.calls_for("foo"), 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl SubscriptionStore for BrokenStore {
        async fn load(&self) -> crate::Result<Subscriptions> {
            Err(crate::Error::storage("disk on fire"))
        }

        async fn save(&self, _subscriptions: &Subscriptions) -> crate::Result<()> {
            Err(crate::Error::storage("disk on fire"))
        }
    }

    #[tokio::test]
    async fn test_unreadable_subscriptions_skip_cycle() {
        let h = harness().await;
        let mut monitor = StreamMonitor::new(
            Arc::new(SubscriptionService::new(Arc::new(BrokenStore))),
            h.source.clone(),
            h.tokens.clone(),
            Arc::new(Notifier::new(h.outbox.clone())),
            StreamMonitorConfig::default(),
        );

        let report = monitor.run_cycle().await;
        assert!(matches!(
            report.outcome,
            CycleOutcome::Skipped(SkipReason::SubscriptionsUnavailable(_))
        ));
        assert!(h.source.calls.lock().is_empty());
    }

    struct SlowSource;

    #[async_trait]
    impl StatusSource for SlowSource {
        async fn check(&self, _channel: &str, _token: &str) -> Result<LiveStatus, QueryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(LiveStatus::Offline)
        }
    }

    #[tokio::test]
    async fn test_hung_query_times_out() {
        let h = harness().await;
        subscribe(&h, "100", "foo").await;
        let mut monitor = StreamMonitor::new(
            h.subscriptions.clone(),
            Arc::new(SlowSource),
            h.tokens.clone(),
            Arc::new(Notifier::new(h.outbox.clone())),
            StreamMonitorConfig {
                query_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );

        let report = monitor.run_cycle().await;
        assert_eq!(report.query_failures, 1);
        assert_eq!(monitor.tracker().get("foo"), None);
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_cancel() {
        let h = harness().await;
        subscribe(&h, "100", "foo").await;
        let source = h.source.clone();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(h.monitor.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should stop promptly")
            .unwrap();

        assert!(source.calls_for("foo") >= 2);
    }
}
