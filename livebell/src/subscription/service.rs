//! Serialized access to the subscription store.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::model::{ChannelName, Subscriptions};
use super::store::SubscriptionStore;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadySubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotSubscribed,
}

/// Subscription operations over a [`SubscriptionStore`].
///
/// Every mutation is a load → modify → save sequence executed under a single
/// async mutex, so concurrent adds and removes are never lost.
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    write_lock: Mutex<()>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Full snapshot for one poll cycle.
    pub async fn snapshot(&self) -> Result<Subscriptions> {
        self.store.load().await
    }

    pub async fn add(&self, subscriber: &str, channel: &ChannelName) -> Result<AddOutcome> {
        self.update(|subs| {
            if subs.add(subscriber, channel) {
                AddOutcome::Added
            } else {
                AddOutcome::AlreadySubscribed
            }
        })
        .await
        .inspect(|outcome| {
            if *outcome == AddOutcome::Added {
                info!(subscriber = %subscriber, channel = %channel, "Subscription added");
            }
        })
    }

    pub async fn remove(&self, subscriber: &str, channel: &ChannelName) -> Result<RemoveOutcome> {
        self.update(|subs| {
            if subs.remove(subscriber, channel) {
                RemoveOutcome::Removed
            } else {
                RemoveOutcome::NotSubscribed
            }
        })
        .await
        .inspect(|outcome| {
            if *outcome == RemoveOutcome::Removed {
                info!(subscriber = %subscriber, channel = %channel, "Subscription removed");
            }
        })
    }

    pub async fn list(&self, subscriber: &str) -> Result<Vec<String>> {
        Ok(self.store.load().await?.channels_of(subscriber))
    }

    /// Run a read-modify-write cycle; the store is only written when `f`
    /// reports a change via its outcome.
    async fn update<T, F>(&self, f: F) -> Result<T>
    where
        T: ChangeOutcome,
        F: FnOnce(&mut Subscriptions) -> T,
    {
        let _guard = self.write_lock.lock().await;

        let mut subs = self.store.load().await?;
        let outcome = f(&mut subs);
        if outcome.changed() {
            self.store.save(&subs).await?;
        } else {
            debug!("Subscription update was a no-op, skipping save");
        }
        Ok(outcome)
    }
}

trait ChangeOutcome {
    fn changed(&self) -> bool;
}

impl ChangeOutcome for AddOutcome {
    fn changed(&self) -> bool {
        *self == AddOutcome::Added
    }
}

impl ChangeOutcome for RemoveOutcome {
    fn changed(&self) -> bool {
        *self == RemoveOutcome::Removed
    }
}
