//! Client for the remote extraction service.
//!
//! The service is a black box reached over HTTP:
//! `GET {base}/api/extract?url=..&prefer=mp4&timeout=<ms>&quality=..` answers with
//! `{ success, version, data?: {url, type, quality, headers, direct, extractor},
//! metadata?: {cached, attemptUsed, extractionTime}, error?: {message} }`.
//! Responses are parsed into [`BackendExtraction`] at this boundary; anything
//! else becomes a transport error.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::Prefer;
use crate::error::{ResolveError, Result};
use crate::media::ContainerType;

/// What the engine asks the backend for on each attempt.
#[derive(Debug, Clone)]
pub struct ExtractRequest<'a> {
    pub url: &'a str,
    pub prefer: Prefer,
    pub quality: &'a str,
    pub timeout: Duration,
}

/// A candidate resolution returned by the backend, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendExtraction {
    pub url: String,
    pub container: ContainerType,
    pub quality: String,
    pub headers: HashMap<String, String>,
    pub direct: bool,
    pub extractor: Option<String>,
    pub backend_version: Option<String>,
    pub backend_attempt: Option<u32>,
    pub backend_time_ms: Option<u64>,
}

#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &str;

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<BackendExtraction>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractResponse {
    #[serde(default)]
    success: bool,
    version: Option<String>,
    data: Option<ExtractData>,
    metadata: Option<ExtractMetadata>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ExtractData {
    url: Option<String>,
    #[serde(rename = "type")]
    container: Option<String>,
    quality: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    direct: bool,
    extractor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractMetadata {
    attempt_used: Option<u32>,
    extraction_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Turns a raw `/api/extract` response into a [`BackendExtraction`].
pub fn parse_extract_response(
    status: StatusCode,
    body: &str,
    endpoint: &str,
) -> Result<BackendExtraction> {
    let response: ExtractResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) if !status.is_success() => {
            return Err(ResolveError::http_status(status, endpoint));
        }
        Err(e) => return Err(ResolveError::malformed(format!("invalid JSON: {e}"))),
    };

    if !status.is_success() || !response.success {
        let message = response
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(ResolveError::backend(message));
    }

    let data = response
        .data
        .ok_or_else(|| ResolveError::malformed("no data in backend response"))?;
    let url = data
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ResolveError::malformed("no video URL in backend response"))?;

    let (backend_attempt, backend_time_ms) = response
        .metadata
        .map(|m| (m.attempt_used, m.extraction_time))
        .unwrap_or_default();

    Ok(BackendExtraction {
        url,
        container: data
            .container
            .as_deref()
            .map(ContainerType::parse_lenient)
            .unwrap_or(ContainerType::Mp4),
        quality: data.quality.unwrap_or_else(|| "auto".to_string()),
        headers: data.headers,
        direct: data.direct,
        extractor: data.extractor,
        backend_version: response.version,
        backend_attempt,
        backend_time_ms,
    })
}

/// [`ExtractionBackend`] talking to the extraction service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpExtractionBackend {
    client: Client,
    base_url: String,
}

impl HttpExtractionBackend {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/extract", self.base_url)
    }
}

#[async_trait]
impl ExtractionBackend for HttpExtractionBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<BackendExtraction> {
        let endpoint = self.endpoint();
        let mut query: Vec<(&str, String)> = vec![("url", request.url.to_string())];
        if request.prefer == Prefer::Mp4 {
            query.push(("prefer", Prefer::Mp4.as_str().to_string()));
        }
        query.push(("timeout", request.timeout.as_millis().to_string()));
        query.push(("quality", request.quality.to_string()));

        let response = self
            .client
            .get(&endpoint)
            .header(ACCEPT, "application/json")
            .query(&query)
            .timeout(request.timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(status = %status, bytes = body.len(), "Extraction backend responded");
        parse_extract_response(status, &body, &endpoint)
    }
}
