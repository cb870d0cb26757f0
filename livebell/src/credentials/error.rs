//! Credential error types.

use thiserror::Error;

/// Errors that can occur while obtaining an access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The client id/secret pair was rejected.
    #[error("Invalid client credentials: {0}")]
    InvalidCredentials(String),

    /// The token endpoint could not be reached or answered with an error.
    #[error("Token request failed: {0}")]
    RequestFailed(String),
}

impl From<helix_client::HelixError> for CredentialError {
    fn from(err: helix_client::HelixError) -> Self {
        if err.is_unauthorized() {
            CredentialError::InvalidCredentials(err.to_string())
        } else {
            CredentialError::RequestFailed(err.to_string())
        }
    }
}
