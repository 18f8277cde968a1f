use std::path::PathBuf;

use stream_resolver::ResolveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("extraction service unhealthy: {0}")]
    Unhealthy(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
