//! Access credentials for the status source.
//!
//! - [`CredentialProvider`]: fetches a fresh token
//! - [`TokenManager`]: caches the token and refreshes it when asked or when it nears expiry

mod error;
mod manager;
mod provider;

pub use error::CredentialError;
pub use manager::TokenManager;
pub use provider::{AccessToken, CredentialProvider, HelixCredentialProvider};
