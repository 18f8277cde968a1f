//! Stream resolver: turns episode mirror URLs into playable stream URLs.
//!
//! Embed pages are handed to a remote extraction service which returns the
//! underlying media URL. This crate wraps that service with the client-side
//! machinery that makes it usable: classification, caching, retries, mirror
//! fallback and health reporting.
//!
//! ## Pipeline
//!
//! - [`classifier`] - direct-media detection, quality inference, URL safety
//! - [`ResultCache`] - TTL cache of results plus a negative cache of failures
//! - [`ExtractionEngine`] - bounded retry with backoff around the backend
//! - [`SourceSelector`] - language-priority ordering and mirror fallback
//! - [`ConnectivityProbe`] - health check against the extraction service
//! - [`ResolverStats`] - request, success, failure and cache counters
//!
//! ## Entry point
//!
//! [`Resolver`] composes all of the above from a [`ResolverConfig`].

pub mod backend;
pub mod cache;
pub mod classifier;
pub mod client;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod health;
pub mod media;
pub mod resolver;
pub mod retry;
pub mod selector;
pub mod stats;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use backend::{BackendExtraction, ExtractRequest, ExtractionBackend, HttpExtractionBackend};
pub use cache::{CacheConfig, CacheKey, ResultCache};
pub use config::{ExtractOptions, Prefer, ResolverConfig};
pub use context::ResolverContext;
pub use engine::ExtractionEngine;
pub use error::{ResolveError, Result};
pub use health::{ConnectivityProbe, HealthStatus};
pub use media::{
    CandidateUrl, ContainerType, Episode, ExtractionResult, LanguageTrack, ResolvedEpisode,
};
pub use resolver::{DiagnosticReport, Resolver};
pub use retry::RetryPolicy;
pub use selector::{LanguagePriority, RankedCandidate, SourceSelector, plan_candidates};
pub use stats::{ResolverStats, StatsSnapshot};
pub use validation::{HeadProbe, UrlValidator, Validation};
