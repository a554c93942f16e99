use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;

/// Client-side telemetry pipeline
#[derive(Parser, Debug)]
#[command(name = "rumkit")]
#[command(about = "Batch, deduplicate and deliver telemetry events to a collector, with an offline backlog")]
#[command(version)]
pub struct Args {
    /// Verbose output (debug level logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Application id (overrides client.app-id)
    #[arg(long, value_name = "ID", global = true)]
    pub app_id: Option<String>,

    /// Release (overrides client.release)
    #[arg(long, value_name = "VERSION", global = true)]
    pub release: Option<String>,

    /// Collector URL (overrides transport.endpoint)
    #[arg(long, value_name = "URL", global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Track newline-delimited JSON events and flush them on end of input
    Send {
        /// Input file; standard input when omitted
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Seconds to wait for in-flight deliveries before exiting
        #[arg(long, value_name = "SECS", default_value_t = 3)]
        settle: u64,
    },

    /// Inspect or clear the offline backlog
    Backlog {
        #[command(subcommand)]
        action: BacklogAction,
    },

    /// Show the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogAction {
    /// Print persisted events
    Show,
    /// Discard persisted events
    Clear,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print loaded sections
    Show,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    debug!("Parsing command line arguments");
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    debug!("Validating CLI argument combinations");

    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {}
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Valid options: text, json",
                args.log_format
            ))
        }
    }

    if let Some(ref level) = args.log_file_level {
        crate::logging::parse_log_level(level)?;
        if args.log_file.is_none() {
            return Err(anyhow::anyhow!("--log-file-level requires --log-file"));
        }
    }

    if let Some(ref endpoint) = args.endpoint {
        url::Url::parse(endpoint).map_err(|e| anyhow::anyhow!("Invalid endpoint '{}': {}", endpoint, e))?;
    }

    Ok(())
}
