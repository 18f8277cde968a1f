mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let output_format = args.output;

    if let Err(e) = run(args).await {
        match output_format {
            OutputFormat::Json => {
                let error_json = serde_json::json!({
                    "status": "error",
                    "message": e.to_string(),
                });
                println!("{error_json}");
            }
            OutputFormat::Pretty => {
                error!("Application error: {}", e);
                #[cfg(feature = "colored-output")]
                {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                #[cfg(not(feature = "colored-output"))]
                {
                    eprintln!("Error: {}", e);
                }
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let config = AppConfig::load(args.config.as_deref())?;
    debug!(?config, "Loaded configuration");

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c_token.cancel();
        }
    });

    let executor = CommandExecutor::new(&config, args.backend_url.as_deref(), args.output, token)?;

    match args.command {
        Commands::Classify { url } => executor.classify(&url)?,
        Commands::Extract {
            url,
            mp4,
            quality,
            timeout,
        } => executor.extract(&url, mp4, quality, timeout).await?,
        Commands::Episode { input, languages } => executor.episode(&input, languages).await?,
        Commands::Health => executor.health().await?,
        Commands::Debug { url } => executor.debug(&url).await?,
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = log_filter(verbose, quiet, std::env::var("RUST_LOG").ok());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}

/// `--quiet` and `--verbose` win over `RUST_LOG`, which wins over `info`.
fn log_filter(verbose: bool, quiet: bool, rust_log: Option<String>) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        rust_log
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn rust_log_is_honoured_without_flags() {
        let filter = log_filter(false, false, Some("debug".to_string()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = log_filter(false, false, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));

        let filter = log_filter(false, true, Some("trace".to_string()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }
}
