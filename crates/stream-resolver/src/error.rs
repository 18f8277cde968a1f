//! Error types for the resolution pipeline.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The same URL exhausted its attempts recently and is still in the failure cache.
    #[error("URL recently failed, try again later: {url}")]
    RecentFailure { url: String },

    /// The resolved URL answered the validation probe with an explicit failure status.
    #[error("resolved URL failed validation with HTTP {status}: {url}")]
    ValidationFailed { url: String, status: StatusCode },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    /// The extraction service answered but reported `success=false`.
    #[error("extraction backend error: {message}")]
    Backend { message: String },

    #[error("malformed backend response: {reason}")]
    MalformedResponse { reason: String },

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("extraction failed after {attempts} attempts{}", describe_last(.last))]
    ExhaustedRetries {
        attempts: u32,
        last: Option<Box<ResolveError>>,
    },

    #[error("no playable source found among {candidates} candidates{}", describe_last(.last))]
    NoValidSource {
        candidates: usize,
        last: Option<Box<ResolveError>>,
    },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("resolution cancelled")]
    Cancelled,

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

fn describe_last(last: &Option<Box<ResolveError>>) -> String {
    match last {
        Some(err) => format!(": {err}"),
        None => String::new(),
    }
}

impl ResolveError {
    pub fn recent_failure(url: impl Into<String>) -> Self {
        Self::RecentFailure { url: url.into() }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn exhausted(attempts: u32, last: Option<ResolveError>) -> Self {
        Self::ExhaustedRetries {
            attempts,
            last: last.map(Box::new),
        }
    }

    pub fn no_valid_source(candidates: usize, last: Option<ResolveError>) -> Self {
        Self::NoValidSource {
            candidates,
            last: last.map(Box::new),
        }
    }

    /// Errors raised while reaching or talking to the extraction service.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::HttpStatus { .. }
                | Self::Backend { .. }
                | Self::MalformedResponse { .. }
                | Self::Timeout { .. }
        )
    }

    /// Whether a single extraction attempt failing with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled
            | Self::Configuration { .. }
            | Self::InvalidUrl { .. }
            | Self::RecentFailure { .. }
            | Self::ExhaustedRetries { .. }
            | Self::NoValidSource { .. } => false,
            Self::ValidationFailed { .. }
            | Self::Network { .. }
            | Self::HttpStatus { .. }
            | Self::Backend { .. }
            | Self::MalformedResponse { .. }
            | Self::Timeout { .. } => true,
        }
    }

    /// The innermost attempt error, when this error wraps one.
    pub fn last_error(&self) -> Option<&ResolveError> {
        match self {
            Self::ExhaustedRetries { last, .. } | Self::NoValidSource { last, .. } => {
                last.as_deref()
            }
            _ => None,
        }
    }
}
