//! Fan-out of live notifications to subscribers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::channels::{DeliveryChannel, DeliveryError};
use super::events::LiveNotification;

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: Vec<(String, DeliveryError)>,
}

impl DispatchReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Delivers live notifications through a [`DeliveryChannel`].
pub struct Notifier {
    channel: Arc<dyn DeliveryChannel>,
}

impl Notifier {
    pub fn new(channel: Arc<dyn DeliveryChannel>) -> Self {
        Self { channel }
    }

    /// Send `notification` to every subscriber.
    ///
    /// Each subscriber is attempted exactly once; a failure is logged and
    /// does not stop delivery to the rest.
    pub async fn notify(
        &self,
        notification: &LiveNotification,
        subscribers: &[String],
    ) -> DispatchReport {
        let text = notification.render();
        let mut report = DispatchReport::default();

        for subscriber in subscribers {
            report.attempted += 1;
            match self.channel.send_text(subscriber, &text).await {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(
                        channel = %notification.channel,
                        subscriber = %subscriber,
                        "Live notification delivered"
                    );
                }
                Err(e) => {
                    warn!(
                        channel = %notification.channel,
                        subscriber = %subscriber,
                        via = self.channel.channel_type(),
                        error = %e,
                        "Failed to deliver live notification"
                    );
                    report.failed.push((subscriber.clone(), e));
                }
            }
        }

        info!(
            channel = %notification.channel,
            delivered = report.delivered,
            failed = report.failure_count(),
            "Live notification dispatched"
        );
        report
    }
}
