//! Telegram chat front end: command parsing, replies and update polling.

pub mod commands;
pub mod updates;

pub use commands::{Command, CommandHandler};
pub use updates::UpdatePoller;
