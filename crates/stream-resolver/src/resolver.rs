//! The [`Resolver`] facade wiring the pipeline together.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::{ExtractionBackend, HttpExtractionBackend};
use crate::client::create_client;
use crate::config::{ExtractOptions, ResolverConfig};
use crate::context::ResolverContext;
use crate::engine::ExtractionEngine;
use crate::error::{ResolveError, Result};
use crate::health::{ConnectivityProbe, HealthStatus};
use crate::media::{CandidateUrl, Episode, ExtractionResult, ResolvedEpisode};
use crate::selector::{LanguagePriority, SourceSelector};
use crate::stats::StatsSnapshot;
use crate::validation::{HeadProbe, UrlValidator};

/// Health, one extraction attempt and the counters, captured together.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub url: String,
    pub candidate: CandidateUrl,
    pub health: HealthStatus,
    pub success: bool,
    pub result: Option<ExtractionResult>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub stats: StatsSnapshot,
}

pub struct Resolver {
    config: ResolverConfig,
    engine: Arc<ExtractionEngine>,
    selector: SourceSelector,
    probe: ConnectivityProbe,
}

impl Resolver {
    /// Builds a resolver talking to the extraction service at
    /// [`ResolverConfig::backend_url`].
    pub fn new(config: ResolverConfig) -> Result<Self> {
        check_backend_url(config.backend_url())?;
        let client = create_client(&config)?;
        let backend = HttpExtractionBackend::new(client.clone(), config.backend_url());
        let validator = HeadProbe::new(client, config.validation_timeout);
        Self::with_backend(config, Arc::new(backend), Arc::new(validator))
    }

    /// Builds a resolver around caller-supplied backend and validator. The health
    /// probe still targets [`ResolverConfig::backend_url`].
    pub fn with_backend(
        config: ResolverConfig,
        backend: Arc<dyn ExtractionBackend>,
        validator: Arc<dyn UrlValidator>,
    ) -> Result<Self> {
        let client = create_client(&config)?;
        let context = Arc::new(ResolverContext::new(config.cache.clone()));
        let engine = Arc::new(ExtractionEngine::new(
            backend,
            validator,
            context,
            config.retry.clone(),
            config.attempt_timeout,
        ));
        let selector = SourceSelector::new(engine.clone(), config.episode_defaults.clone());
        let probe = ConnectivityProbe::new(client, config.backend_url(), config.health_timeout);

        info!(
            backend_url = config.backend_url(),
            max_attempts = config.retry.max_attempts,
            "Resolver initialized"
        );

        Ok(Self {
            config,
            engine,
            selector,
            probe,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<ResolverContext> {
        self.engine.context()
    }

    pub fn classify(&self, url: &str) -> CandidateUrl {
        CandidateUrl::classify(url.trim())
    }

    pub async fn extract(&self, url: &str, options: &ExtractOptions) -> Result<ExtractionResult> {
        self.engine.extract(url, options).await
    }

    pub async fn extract_with_cancel(
        &self,
        url: &str,
        options: &ExtractOptions,
        token: &CancellationToken,
    ) -> Result<ExtractionResult> {
        self.engine.extract_with_cancel(url, options, token).await
    }

    pub async fn resolve_episode(
        &self,
        episode: &Episode,
        priority: &LanguagePriority,
    ) -> Result<ResolvedEpisode> {
        self.selector.resolve_episode(episode, priority).await
    }

    pub async fn resolve_episode_with_cancel(
        &self,
        episode: &Episode,
        priority: &LanguagePriority,
        token: &CancellationToken,
    ) -> Result<ResolvedEpisode> {
        self.selector
            .resolve_episode_with_cancel(episode, priority, token)
            .await
    }

    pub async fn check_health(&self) -> HealthStatus {
        self.probe.check_health().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.context().snapshot()
    }

    /// Zeroes the counters and empties both caches.
    pub fn reset_stats(&self) {
        self.context().reset();
    }

    /// Runs a health check and one extraction of `url`, reporting both.
    pub async fn diagnose(&self, url: &str) -> DiagnosticReport {
        let started = Instant::now();
        let health = self.check_health().await;
        let outcome = self.extract(url, &ExtractOptions::default()).await;

        let (success, result, error) = match outcome {
            Ok(result) => (true, Some(result), None),
            Err(e) => (false, None, Some(e.to_string())),
        };

        DiagnosticReport {
            url: url.to_string(),
            candidate: self.classify(url),
            health,
            success,
            result,
            error,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            stats: self.stats(),
        }
    }
}

fn check_backend_url(base: &str) -> Result<()> {
    let parsed = url::Url::parse(base).map_err(|e| {
        ResolveError::configuration(format!("invalid backend URL `{base}`: {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ResolveError::configuration(format!(
            "backend URL must be http(s), got `{}`",
            parsed.scheme()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedBackend, StaticValidator, fast_policy};

    fn resolver(backend: Arc<ScriptedBackend>) -> Resolver {
        // port 9 refuses connections, so health checks fail fast
        let config = ResolverConfig::new("http://127.0.0.1:9").with_retry(fast_policy());
        Resolver::with_backend(config, backend, Arc::new(StaticValidator::Accept)).unwrap()
    }

    #[test]
    fn rejects_bad_backend_urls() {
        for base in ["not a url", "ftp://extractor.example"] {
            let err = Resolver::new(ResolverConfig::new(base)).err().unwrap();
            assert!(matches!(err, ResolveError::Configuration { .. }), "{base}");
        }
        assert!(Resolver::new(ResolverConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn reset_clears_stats_and_cache() {
        let backend = Arc::new(ScriptedBackend::always_ok("https://cdn.example/v.mp4"));
        let resolver = resolver(backend);
        resolver
            .extract("https://sendvid.com/embed/x", &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(resolver.stats().cache_size, 1);

        resolver.reset_stats();
        let stats = resolver.stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.cache_size, 0);
    }

    #[tokio::test]
    async fn diagnose_reports_health_and_extraction() {
        let backend = Arc::new(ScriptedBackend::always_ok("https://cdn.example/v.m3u8"));
        let resolver = resolver(backend);
        let report = resolver.diagnose("https://sendvid.com/embed/y").await;

        assert!(report.success);
        assert!(!report.health.success);
        assert!(!report.candidate.is_direct);
        assert_eq!(report.result.unwrap().url, "https://cdn.example/v.m3u8");
        assert!(report.error.is_none());
        assert_eq!(report.stats.total_requests, 1);
    }
}
