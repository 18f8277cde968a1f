use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stream_resolver::{LanguagePriority, ResolverConfig};
use tracing::debug;

use crate::error::{CliError, Result};

/// Settings read from `config.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: Option<String>,
    pub request_timeout_secs: u64,
    pub attempt_timeout_secs: u64,
    pub max_attempts: u32,
    /// Language priority for `episode`, highest first
    pub languages: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            backend_url: None,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            attempt_timeout_secs: defaults.attempt_timeout.as_secs(),
            max_attempts: defaults.retry.max_attempts,
            languages: LanguagePriority::default().languages().to_vec(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/stream-resolver/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stream-resolver").join("config.toml"))
    }

    /// Loads `path`, or the default location when `None`. Only an explicit path
    /// is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|source| CliError::Config { path, source })
    }

    /// Library configuration, with `backend_override` taking precedence over the file.
    pub fn resolver_config(&self, backend_override: Option<&str>) -> ResolverConfig {
        let mut config = ResolverConfig::default();
        if let Some(url) = backend_override.or(self.backend_url.as_deref()) {
            config.set_backend_url(url);
        }
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config.attempt_timeout = Duration::from_secs(self.attempt_timeout_secs);
        config.retry.max_attempts = self.max_attempts.max(1);
        config
    }

    pub fn priority(&self) -> LanguagePriority {
        if self.languages.is_empty() {
            LanguagePriority::default()
        } else {
            LanguagePriority::new(self.languages.iter().cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend_url = \"https://extractor.example/\"").unwrap();
        writeln!(file, "languages = [\"VF\", \"VOSTFR\"]").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_attempts, 6);
        assert_eq!(config.attempt_timeout_secs, 60);
        assert_eq!(config.priority().rank("vostfr"), Some(1));

        let resolver = config.resolver_config(None);
        assert_eq!(resolver.backend_url(), "https://extractor.example");
    }

    #[test]
    fn flag_overrides_file() {
        let config = AppConfig {
            backend_url: Some("https://from-file.example".into()),
            ..AppConfig::default()
        };
        let resolver = config.resolver_config(Some("http://localhost:9000/"));
        assert_eq!(resolver.backend_url(), "http://localhost:9000");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/resolver.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_attempts = \"six\"").unwrap();
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
