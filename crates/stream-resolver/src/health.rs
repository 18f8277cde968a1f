//! Connectivity probe against the extraction service's `/health` endpoint.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Outcome of a health check. Failures are reported here, never as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub success: bool,
    pub version: Option<String>,
    pub uptime_seconds: Option<f64>,
    /// Number of host entries the service reports in its cache section
    pub supported_hosts: usize,
    pub message: String,
    /// Raw `memory`, `cache` and `performance` sections, when present
    pub details: Option<Value>,
}

impl HealthStatus {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            version: None,
            uptime_seconds: None,
            supported_hosts: 0,
            message: message.into(),
            details: None,
        }
    }

    /// Builds a status from the HTTP status and JSON body of `/health`.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let payload: HealthPayload = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                return Self::failed(format!("unreadable health payload (HTTP {status}): {e}"));
            }
        };

        let healthy = payload.status.as_deref() == Some("healthy");
        let supported_hosts = payload
            .cache
            .as_ref()
            .and_then(Value::as_object)
            .map_or(0, |cache| cache.len());

        let details = if payload.memory.is_some()
            || payload.cache.is_some()
            || payload.performance.is_some()
        {
            Some(serde_json::json!({
                "memory": payload.memory,
                "cache": payload.cache,
                "performance": payload.performance,
            }))
        } else {
            None
        };

        Self {
            success: status.is_success(),
            version: payload.version,
            uptime_seconds: payload.uptime,
            supported_hosts,
            message: if healthy {
                "extraction service operational".to_string()
            } else {
                format!(
                    "extraction service reports issues (status: {})",
                    payload.status.as_deref().unwrap_or("unknown")
                )
            },
            details,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthPayload {
    status: Option<String>,
    version: Option<String>,
    uptime: Option<f64>,
    memory: Option<Value>,
    cache: Option<Value>,
    performance: Option<Value>,
}

/// Side-channel health check, independent of the extraction path.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: format!("{base_url}/health"),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One bounded GET, no retries.
    pub async fn check_health(&self) -> HealthStatus {
        let result = async {
            let response = self
                .client
                .get(&self.endpoint)
                .header(ACCEPT, "application/json")
                .timeout(self.timeout)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;

        let health = match result {
            Ok((status, body)) => HealthStatus::from_response(status, &body),
            Err(e) => HealthStatus::failed(format!("connectivity error: {e}")),
        };

        if health.success {
            info!(version = ?health.version, "Extraction service reachable");
        } else {
            warn!(message = %health.message, "Extraction service health check failed");
        }
        health
    }
}
