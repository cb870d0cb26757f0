//! livebell: Telegram notifications when followed Twitch channels go live.
//!
//! Subscribers manage their channel list through chat commands; a background
//! poll loop checks every subscribed channel on a fixed interval and notifies
//! all subscribers of a channel when it goes from offline to live.

pub mod bot;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod services;
pub mod subscription;

pub use config::AppConfig;
pub use error::{Error, Result};
