//! Optimistic validation of resolved URLs.
//!
//! A URL is rejected only when the host answers the probe with a non-success
//! status. Probe errors and timeouts are inconclusive and accepted. A dead link
//! behind a host that times out or answers 200 for everything therefore passes
//! validation and only fails at playback.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The probe succeeded.
    Valid,
    /// The probe got no answer; treated as valid.
    Inconclusive(String),
    /// The host answered with a non-success status.
    Rejected(StatusCode),
}

impl Validation {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Validation::Rejected(_))
    }
}

#[async_trait]
pub trait UrlValidator: Send + Sync {
    /// Probe `url`, sending the playback `headers` the backend asked for.
    async fn validate(&self, url: &str, headers: &HashMap<String, String>) -> Validation;
}

/// Maps an answered probe's HTTP status to a [`Validation`].
pub fn classify_status(status: StatusCode) -> Validation {
    if status.is_success() || status.is_redirection() {
        Validation::Valid
    } else {
        Validation::Rejected(status)
    }
}

/// [`UrlValidator`] issuing a bounded HEAD request.
#[derive(Debug, Clone)]
pub struct HeadProbe {
    client: Client,
    timeout: Duration,
}

impl HeadProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl UrlValidator for HeadProbe {
    async fn validate(&self, url: &str, headers: &HashMap<String, String>) -> Validation {
        let mut request = self.client.head(url).timeout(self.timeout);
        for (key, value) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                request = request.header(name, value);
            }
        }

        match request.send().await {
            Ok(response) => classify_status(response.status()),
            Err(e) => {
                debug!(error = %e, "Validation probe failed, assuming valid");
                Validation::Inconclusive(e.to_string())
            }
        }
    }
}
