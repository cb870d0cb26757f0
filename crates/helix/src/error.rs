use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelixError {
    #[error("request timed out")]
    Timeout,
    #[error("http error: {0}")]
    Http(reqwest::Error),
    #[error("unauthorized (status {status})")]
    Unauthorized { status: u16 },
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token response did not contain an access token")]
    MissingToken,
}

impl From<reqwest::Error> for HelixError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HelixError::Timeout
        } else {
            HelixError::Http(err)
        }
    }
}

impl HelixError {
    /// The credential was rejected (401/403); the caller should re-authenticate.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HelixError::Unauthorized { .. })
    }

    /// Failures worth retrying on the next attempt without new credentials.
    pub fn is_transient(&self) -> bool {
        match self {
            HelixError::Timeout | HelixError::Http(_) | HelixError::Json(_) => true,
            HelixError::Status { status, .. } => *status == 429 || *status >= 500,
            HelixError::Unauthorized { .. } | HelixError::MissingToken => false,
        }
    }
}
