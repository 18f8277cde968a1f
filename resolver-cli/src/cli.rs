use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "resolver",
    author,
    version,
    about = "Resolve episode mirrors into playable stream URLs",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the extraction service
    #[arg(long, global = true, env = "RESOLVER_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a URL without any network access
    Classify {
        url: String,
    },

    /// Resolve a single URL through the extraction service
    Extract {
        url: String,

        /// Ask the service to prefer MP4 over HLS
        #[arg(long)]
        mp4: bool,

        /// Requested quality label
        #[arg(long, default_value = "best")]
        quality: String,

        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Resolve an episode described by a JSON file (`-` reads stdin)
    Episode {
        input: String,

        /// Comma-separated language priority, e.g. `VOSTFR,VF`
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,
    },

    /// Check that the extraction service is reachable
    Health,

    /// Run a health check and one extraction, printing everything
    Debug {
        url: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}
