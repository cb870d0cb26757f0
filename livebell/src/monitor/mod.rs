//! Live-status monitoring.
//!
//! - [`StatusSource`]: answers "is this channel live?"
//! - [`LivenessTracker`]: last known state per channel, yields transitions
//! - [`RateLimiter`]: spaces out status queries
//! - [`StreamMonitor`]: the poll loop tying them together

pub mod detector;
pub mod rate_limiter;
pub mod service;
pub mod tracker;

pub use detector::{HelixStatusSource, LiveStatus, QueryError, StatusSource};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use service::{
    CycleOutcome, CycleReport, MonitorState, SkipReason, StreamMonitor, StreamMonitorConfig,
};
pub use tracker::{LivenessTracker, Transition, UnknownPolicy};
