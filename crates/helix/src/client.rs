use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{ClientBuilder, Response};
use tracing::debug;

use crate::error::HelixError;

pub(crate) const DEFAULT_UA: &str = concat!("livebell/", env!("CARGO_PKG_VERSION"));

/// Default bound on every Helix/OAuth request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Installs the aws-lc-rs rustls provider once per process.
///
/// reqwest is built without a bundled provider, so this must run before the
/// first client is constructed.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// A client builder preconfigured with the user agent and request timeout.
///
/// A zero timeout disables the bound.
pub fn create_client_builder(timeout: Duration) -> ClientBuilder {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder().user_agent(DEFAULT_UA);
    if timeout > Duration::ZERO {
        builder = builder.timeout(timeout);
    }
    builder
}

/// Maps non-success responses onto [`HelixError`].
pub(crate) async fn check_status(response: Response) -> Result<Response, HelixError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    if code == 401 || code == 403 {
        return Err(HelixError::Unauthorized { status: code });
    }

    let body = response.text().await.unwrap_or_default();
    Err(HelixError::Status { status: code, body })
}
