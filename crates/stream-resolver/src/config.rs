//! Resolver configuration and per-call extraction options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::retry::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "stream-resolver/0.1";

/// Container preference forwarded to the extraction service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prefer {
    Mp4,
    #[default]
    Auto,
}

impl Prefer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prefer::Mp4 => "mp4",
            Prefer::Auto => "auto",
        }
    }
}

/// Per-call extraction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    pub prefer: Prefer,
    /// Requested quality label, `"best"` by default.
    pub quality: String,
    /// Overrides [`ResolverConfig::attempt_timeout`] for this call.
    pub attempt_timeout: Option<Duration>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            prefer: Prefer::Auto,
            quality: "best".to_string(),
            attempt_timeout: None,
        }
    }
}

impl ExtractOptions {
    /// Options the episode selector uses for every candidate.
    pub fn for_episodes() -> Self {
        Self {
            prefer: Prefer::Mp4,
            quality: "best".to_string(),
            attempt_timeout: Some(Duration::from_secs(45)),
        }
    }
}

/// Configuration for a [`crate::Resolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Base URL of the extraction service, without trailing slash.
    backend_url: String,

    /// Transport-level timeout applied to every HTTP request.
    pub request_timeout: Duration,

    /// Upper bound for the backend call of one extraction attempt. Validation
    /// runs afterwards under `validation_timeout`.
    pub attempt_timeout: Duration,

    /// Timeout of the HEAD probe validating a resolved URL.
    pub validation_timeout: Duration,

    /// Timeout of the connectivity probe.
    pub health_timeout: Duration,

    pub user_agent: String,

    pub retry: RetryPolicy,

    pub cache: CacheConfig,

    /// Options used for each candidate when resolving an episode.
    pub episode_defaults: ExtractOptions,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(60),
            validation_timeout: Duration::from_secs(5),
            health_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            episode_defaults: ExtractOptions::for_episodes(),
        }
    }
}

impl ResolverConfig {
    pub fn new(backend_url: impl AsRef<str>) -> Self {
        let mut config = Self::default();
        config.set_backend_url(backend_url);
        config
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn set_backend_url(&mut self, url: impl AsRef<str>) {
        self.backend_url = url.as_ref().trim().trim_end_matches('/').to_string();
    }

    pub fn with_backend_url(mut self, url: impl AsRef<str>) -> Self {
        self.set_backend_url(url);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
