//! Twitch Helix bindings used for live status checks.
//!
//! Only the two endpoints the live monitor needs are covered: the OAuth
//! client-credentials token endpoint and `GET /helix/streams`.

pub mod auth;
pub mod client;
pub mod error;
pub mod streams;

pub use auth::{AppAccessToken, AuthClient, DEFAULT_ID_BASE};
pub use client::{DEFAULT_REQUEST_TIMEOUT, create_client_builder, install_rustls_provider};
pub use error::HelixError;
pub use streams::{DEFAULT_API_BASE, HelixClient, Stream};
