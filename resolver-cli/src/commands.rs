use std::io::Read;
use std::time::Duration;

use stream_resolver::{Episode, ExtractOptions, LanguagePriority, Prefer, Resolver};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::{OutputManager, write_output};

pub struct CommandExecutor {
    resolver: Resolver,
    output: OutputManager,
    priority: LanguagePriority,
    token: CancellationToken,
}

impl CommandExecutor {
    pub fn new(
        config: &AppConfig,
        backend_url: Option<&str>,
        format: OutputFormat,
        token: CancellationToken,
    ) -> Result<Self> {
        let resolver = Resolver::new(config.resolver_config(backend_url))?;
        Ok(Self {
            resolver,
            output: OutputManager::new(format == OutputFormat::Pretty, format),
            priority: config.priority(),
            token,
        })
    }

    pub fn classify(&self, url: &str) -> Result<()> {
        let candidate = self.resolver.classify(url);
        write_output(&self.output.format_candidate(&candidate)?)
    }

    pub async fn extract(
        &self,
        url: &str,
        mp4: bool,
        quality: String,
        timeout: Option<u64>,
    ) -> Result<()> {
        let options = ExtractOptions {
            prefer: if mp4 { Prefer::Mp4 } else { Prefer::Auto },
            quality,
            attempt_timeout: timeout.map(Duration::from_secs),
        };
        let result = self
            .resolver
            .extract_with_cancel(url, &options, &self.token)
            .await?;
        write_output(&self.output.format_result(&result)?)
    }

    pub async fn episode(&self, input: &str, languages: Vec<String>) -> Result<()> {
        let episode = read_episode(input)?;
        let priority = if languages.is_empty() {
            self.priority.clone()
        } else {
            LanguagePriority::new(languages)
        };
        info!(
            episode = episode.label(),
            tracks = episode.tracks.len(),
            "Loaded episode"
        );

        let resolved = self
            .resolver
            .resolve_episode_with_cancel(&episode, &priority, &self.token)
            .await?;
        write_output(&self.output.format_episode(&resolved)?)
    }

    pub async fn health(&self) -> Result<()> {
        let health = self.resolver.check_health().await;
        write_output(&self.output.format_health(&health)?)?;
        if health.success {
            Ok(())
        } else {
            Err(CliError::Unhealthy(health.message))
        }
    }

    pub async fn debug(&self, url: &str) -> Result<()> {
        let report = self.resolver.diagnose(url).await;
        write_output(&self.output.format_report(&report)?)
    }
}

/// Reads an [`Episode`] from a JSON file, or stdin when `input` is `-`.
fn read_episode(input: &str) -> Result<Episode> {
    let content = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(input)?
    };
    parse_episode(&content)
}

fn parse_episode(content: &str) -> Result<Episode> {
    let episode: Episode = serde_json::from_str(content)?;
    if episode.tracks.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "episode `{}` has no language tracks",
            episode.id
        )));
    }
    Ok(episode)
}
