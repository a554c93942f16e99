//! Application initialization and configuration

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, LevelFilter};

use crate::client::ClientOptions;
use crate::transport::{FileStore, SharedStore};
use crate::{cli, config, logging};

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
    }
    config::ConfigManager::load_with_override(args.config_file.clone())
}

/// Logging settings: command line flags win over `[logging]`
pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    let mut log_config = config.log_config()?;

    if args.debug {
        log_config.console_level = LevelFilter::Trace;
    } else if args.verbose {
        log_config.console_level = LevelFilter::Debug;
    } else if args.quiet {
        log_config.console_level = LevelFilter::Error;
    }
    debug!("Console log level set to: {:?}", log_config.console_level);

    if args.log_format != "text" {
        log_config.format = logging::LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(file_path) = &args.log_file {
        let file_level = match &args.log_file_level {
            Some(level) => logging::parse_log_level(level)?,
            None => log_config.file_level.unwrap_or(log_config.console_level),
        };
        debug!("File logging enabled: {} (level: {:?})", file_path.display(), file_level);
        log_config.destination = logging::LogDestination::Both(file_path.clone());
        log_config.file_level = Some(file_level);
    }

    Ok(log_config)
}

/// Client options from the config file with command line overrides applied
pub fn client_options(args: &cli::Args, config: &config::ConfigManager) -> Result<ClientOptions> {
    let mut options = config.client_options()?;

    if let Some(app_id) = &args.app_id {
        options.context.app_id = app_id.clone();
    }
    if let Some(release) = &args.release {
        options.context.release = release.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        options.transport.endpoint = Some(endpoint.clone());
    }

    Ok(options)
}

/// Backlog store: `transport.backlog-dir` if set, else the per-app data directory
pub fn backlog_store(config: &config::ConfigManager, app_id: &str) -> Result<SharedStore> {
    let store = match config.backlog_dir() {
        Some(dir) => FileStore::new(dir),
        None => FileStore::for_app(app_id).context("No data directory available for the offline backlog")?,
    };
    debug!("Offline backlog directory: {}", store.dir().display());
    Ok(Arc::new(store))
}
