use std::sync::OnceLock;

use reqwest::Client;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // another crate installed a provider first
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the HTTP client shared by the extraction backend, the validation probe
/// and the connectivity probe. It carries no default headers; JSON endpoints set
/// `Accept` per request.
pub fn create_client(config: &ResolverConfig) -> Result<Client> {
    install_rustls_provider();

    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::limited(10));

    if !config.request_timeout.is_zero() {
        builder = builder.timeout(config.request_timeout);
    }

    builder
        .build()
        .map_err(|e| ResolveError::configuration(format!("failed to build HTTP client: {e}")))
}
