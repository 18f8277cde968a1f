//! In-process fakes for the network seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::backend::{BackendExtraction, ExtractRequest, ExtractionBackend};
use crate::classifier;
use crate::config::Prefer;
use crate::error::{ResolveError, Result};
use crate::retry::RetryPolicy;
use crate::validation::{UrlValidator, Validation};

/// The default schedule shape with millisecond delays and no jitter.
pub(crate) fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 6,
        delays: [1, 2, 4, 8, 16, 32]
            .into_iter()
            .map(Duration::from_millis)
            .collect(),
        jitter: 0.0,
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Script {
    Resolve(String),
    Fail,
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedRequest {
    pub url: String,
    pub prefer: Prefer,
    pub quality: String,
    pub timeout: Duration,
}

/// Backend answering from a fixed script, chosen by a substring of the input URL.
pub(crate) struct ScriptedBackend {
    routes: Vec<(String, Script)>,
    fallback: Script,
    calls: AtomicU32,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new(fallback: Script) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok(resolved: &str) -> Self {
        Self::new(Script::Resolve(resolved.to_string()))
    }

    pub fn always_failing() -> Self {
        Self::new(Script::Fail)
    }

    pub fn hanging() -> Self {
        Self::new(Script::Hang)
    }

    pub fn route(mut self, needle: &str, script: Script) -> Self {
        self.routes.push((needle.to_string(), script));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    fn script_for(&self, url: &str) -> Script {
        self.routes
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ExtractionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<BackendExtraction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(RecordedRequest {
            url: request.url.to_string(),
            prefer: request.prefer,
            quality: request.quality.to_string(),
            timeout: request.timeout,
        });

        match self.script_for(request.url) {
            Script::Resolve(url) => Ok(BackendExtraction {
                container: classifier::classify_type(&url),
                quality: "720p".to_string(),
                headers: HashMap::new(),
                direct: true,
                extractor: Some("scripted".to_string()),
                backend_version: Some("test".to_string()),
                backend_attempt: Some(1),
                backend_time_ms: Some(10),
                url,
            }),
            Script::Fail => Err(ResolveError::backend("scripted failure")),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub(crate) enum StaticValidator {
    Accept,
    Inconclusive,
    Reject(StatusCode),
}

#[async_trait]
impl UrlValidator for StaticValidator {
    async fn validate(&self, _url: &str, _headers: &HashMap<String, String>) -> Validation {
        match self {
            StaticValidator::Accept => Validation::Valid,
            StaticValidator::Inconclusive => Validation::Inconclusive("probe timed out".into()),
            StaticValidator::Reject(status) => Validation::Rejected(*status),
        }
    }
}
