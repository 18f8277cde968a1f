//! Extraction engine: direct-URL shortcut, cache lookups, and the bounded
//! retry loop around the extraction backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendExtraction, ExtractRequest, ExtractionBackend};
use crate::cache::CacheKey;
use crate::classifier;
use crate::config::ExtractOptions;
use crate::context::ResolverContext;
use crate::error::{ResolveError, Result};
use crate::media::ExtractionResult;
use crate::retry::{Attempted, RetryAction, RetryPolicy, retry_with_backoff};
use crate::validation::{UrlValidator, Validation};

/// Log-friendly prefix of a possibly very long URL.
pub(crate) fn short_url(url: &str) -> &str {
    const MAX: usize = 100;
    match url.char_indices().nth(MAX) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

pub struct ExtractionEngine {
    backend: Arc<dyn ExtractionBackend>,
    validator: Arc<dyn UrlValidator>,
    context: Arc<ResolverContext>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl ExtractionEngine {
    pub fn new(
        backend: Arc<dyn ExtractionBackend>,
        validator: Arc<dyn UrlValidator>,
        context: Arc<ResolverContext>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            validator,
            context,
            policy,
            attempt_timeout,
        }
    }

    pub fn context(&self) -> &Arc<ResolverContext> {
        &self.context
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolves `url` into a playable URL.
    pub async fn extract(&self, url: &str, options: &ExtractOptions) -> Result<ExtractionResult> {
        self.extract_with_cancel(url, options, &CancellationToken::new())
            .await
    }

    /// Like [`extract`](Self::extract), abandoning work once `token` is cancelled.
    pub async fn extract_with_cancel(
        &self,
        url: &str,
        options: &ExtractOptions,
        token: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ResolveError::invalid_url(url, "empty URL"));
        }

        let started = Instant::now();
        let stats = &self.context.stats;
        stats.record_request();

        if classifier::is_direct(url) {
            debug!(url = short_url(url), "Direct media URL, skipping extraction");
            stats.record_success(None);
            return Ok(ExtractionResult::direct(url));
        }

        let cache = &self.context.cache;
        if let Some(mut hit) = cache.get(url) {
            debug!(key = %CacheKey::from_url(url), "Extraction cache hit");
            stats.record_cache_hit();
            hit.cached = true;
            return Ok(hit);
        }

        if cache.has_recent_failure(url) {
            debug!(url = short_url(url), "URL failed recently, not retrying");
            stats.record_recent_failure_skip();
            return Err(ResolveError::recent_failure(url));
        }

        debug!(
            url = short_url(url),
            backend = self.backend.name(),
            max_attempts = self.policy.max_attempts,
            "Starting extraction"
        );

        let outcome = retry_with_backoff(&self.policy, token, |attempt| async move {
            debug!(attempt = attempt + 1, "Extraction attempt");
            match self.attempt(url, options).await {
                Ok(extraction) => RetryAction::Success(extraction),
                Err(e) if e.is_retryable() => RetryAction::Retry(e),
                Err(e) => RetryAction::Fail(e),
            }
        })
        .await;

        let elapsed = started.elapsed();
        match outcome {
            Ok(Attempted {
                value: extraction,
                attempts,
            }) => {
                let result = into_result(extraction, attempts, elapsed);
                cache.set(url, result.clone());
                stats.record_success(Some(elapsed));
                info!(
                    container = %result.container,
                    quality = %result.quality,
                    attempts,
                    elapsed_ms = result.elapsed_ms,
                    "Extraction succeeded"
                );
                Ok(result)
            }
            Err(ResolveError::Cancelled) => {
                debug!(url = short_url(url), "Extraction cancelled");
                Err(ResolveError::Cancelled)
            }
            Err(e) => {
                cache.set_failure(url);
                stats.record_failure(elapsed);
                error!(
                    url = short_url(url),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Extraction failed"
                );
                Err(e)
            }
        }
    }

    /// One backend call followed by validation of the returned URL.
    async fn attempt(&self, url: &str, options: &ExtractOptions) -> Result<BackendExtraction> {
        let timeout = options.attempt_timeout.unwrap_or(self.attempt_timeout);
        let request = ExtractRequest {
            url,
            prefer: options.prefer,
            quality: &options.quality,
            timeout,
        };

        let extraction = tokio::time::timeout(timeout, self.backend.extract(&request))
            .await
            .map_err(|_| ResolveError::Timeout {
                operation: "extraction attempt",
                after: timeout,
            })??;

        match self
            .validator
            .validate(&extraction.url, &extraction.headers)
            .await
        {
            Validation::Valid => Ok(extraction),
            Validation::Inconclusive(reason) => {
                debug!(reason = %reason, "Validation inconclusive, accepting URL");
                Ok(extraction)
            }
            Validation::Rejected(status) => {
                warn!(status = %status, "Resolved URL rejected by validation probe");
                Err(ResolveError::ValidationFailed {
                    url: extraction.url,
                    status,
                })
            }
        }
    }
}

fn into_result(extraction: BackendExtraction, attempts: u32, elapsed: Duration) -> ExtractionResult {
    ExtractionResult {
        url: extraction.url,
        container: extraction.container,
        quality: extraction.quality,
        headers: extraction.headers,
        extractor: extraction.extractor,
        direct: extraction.direct,
        attempts,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        cached: false,
        backend_version: extraction.backend_version,
        backend_attempt: extraction.backend_attempt,
        backend_time_ms: extraction.backend_time_ms,
    }
}
