//! Notification delivery.
//!
//! When the monitor sees a channel go live it hands a [`LiveNotification`]
//! and the subscriber list to the [`Notifier`], which sends one message per
//! subscriber through a [`DeliveryChannel`] (Telegram in production).

pub mod channels;
pub mod events;
pub mod service;

pub use channels::{
    DEFAULT_TELEGRAM_API_BASE, DeliveryChannel, DeliveryError, TelegramChannel, TelegramConfig,
};
pub use events::LiveNotification;
pub use service::{DispatchReport, Notifier};
