//! Subscriber → channel subscriptions.
//!
//! The poll loop reads a fresh snapshot every cycle; the Telegram command
//! handlers mutate it through [`SubscriptionService`].

mod model;
mod service;
mod store;

pub use model::{ChannelName, Subscriptions};
pub use service::{AddOutcome, RemoveOutcome, SubscriptionService};
pub use store::{JsonFileStore, MemoryStore, SubscriptionStore};
