//! Configuration
//!
//! TOML configuration flattened into `section -> key -> value` strings, with
//! typed getters and conversion into `ClientOptions` and `LogConfig`.
//!
//! Discovery order: explicit path, `$RUMKIT_CONFIG`, the platform config
//! directory (`rumkit/rumkit.toml`), then `./rumkit.toml`.
//!
//! ```toml
//! [client]
//! app-id = "shop-web"
//! release = "2.4.1"
//! allow-params = ["tab", "page"]
//!
//! [transport]
//! endpoint = "https://collect.example.com/rum"
//! strategies = ["beacon", "post", "pixel"]
//!
//! [features]
//! console = true
//! ```

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use toml::Value;

use crate::client::{ClientOptions, Features};
use crate::logging::{LogConfig, LogDestination, LogFormat};
use crate::transport::StrategyKind;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "RUMKIT_CONFIG";

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
        }
    }

    /// Load configuration using the discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load from an explicit path, or discover one
    pub fn load_with_override(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
        })
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// All sections, sorted for display
    pub fn sections(&self) -> BTreeMap<&str, BTreeMap<&str, &str>> {
        self.config
            .iter()
            .map(|(section, values)| {
                let values = values.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                (section.as_str(), values)
            })
            .collect()
    }

    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        self.config.get(section).and_then(|s| s.get(key))
    }

    /// Get boolean value with type conversion
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    /// Get a parsed value
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_value(section, key) {
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid value for {}.{}: {} ({})", section, key, value, e)),
            None => Ok(None),
        }
    }

    /// Get a millisecond count as a duration
    pub fn get_millis(&self, section: &str, key: &str) -> Result<Option<Duration>> {
        Ok(self.get_parsed::<u64>(section, key)?.map(Duration::from_millis))
    }

    /// Get a list value; arrays and comma-separated strings both work
    pub fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get_value(section, key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Client options from `[client]`, `[transport]` and `[features]`.
    /// Identity is not validated here; `Client::init` does that.
    pub fn client_options(&self) -> Result<ClientOptions> {
        let mut options = ClientOptions::default();

        let context = &mut options.context;
        if let Some(app_id) = self.get_value("client", "app-id") {
            context.app_id = app_id.clone();
        }
        if let Some(release) = self.get_value("client", "release") {
            context.release = release.clone();
        }
        context.env = self.get_value("client", "env").cloned();
        context.sample_rate = self.get_parsed::<f64>("client", "sample-rate")?;
        context.allow_domains = self.get_list("client", "allow-domains").unwrap_or_default();
        context.allow_params = self.get_list("client", "allow-params").unwrap_or_default();
        options.initial_url = self.get_value("client", "initial-url").cloned();

        let transport = &mut options.transport;
        transport.endpoint = self.get_value("transport", "endpoint").cloned();
        if let Some(batch_size) = self.get_parsed::<usize>("transport", "batch-size")? {
            transport.batch_size = batch_size;
        }
        if let Some(delay) = self.get_millis("transport", "flush-delay-ms")? {
            transport.flush_delay = delay;
        }
        if let Some(capacity) = self.get_parsed::<usize>("transport", "backlog-capacity")? {
            transport.backlog_capacity = capacity;
        }
        if let Some(names) = self.get_list("transport", "strategies") {
            transport.strategies = names
                .iter()
                .map(|name| name.parse::<StrategyKind>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()
                .context("Invalid transport.strategies")?;
        }
        if let Some(max_bytes) = self.get_parsed::<usize>("transport", "beacon-max-bytes")? {
            transport.beacon_max_bytes = max_bytes;
        }
        if let Some(timeout) = self.get_millis("transport", "request-timeout-ms")? {
            transport.request_timeout = timeout;
        }
        if let Some(wait) = self.get_millis("transport", "pixel-wait-ms")? {
            transport.pixel_wait = wait;
        }
        transport.validate().map_err(anyhow::Error::msg)?;

        options.features = self.features()?;
        Ok(options)
    }

    pub fn features(&self) -> Result<Features> {
        let defaults = Features::default();
        Ok(Features {
            error: self.get_bool("features", "error")?.unwrap_or(defaults.error),
            route: self.get_bool("features", "route")?.unwrap_or(defaults.route),
            console: self.get_bool("features", "console")?.unwrap_or(defaults.console),
            lifecycle: self.get_bool("features", "lifecycle")?.unwrap_or(defaults.lifecycle),
            capture_panics: self
                .get_bool("features", "capture-panics")?
                .unwrap_or(defaults.capture_panics),
        })
    }

    /// Directory holding the offline backlog, if overridden
    pub fn backlog_dir(&self) -> Option<PathBuf> {
        self.get_path("transport", "backlog-dir")
    }

    /// Logging settings from `[logging]`
    pub fn log_config(&self) -> Result<LogConfig> {
        let mut config = LogConfig::default();
        if let Some(level) = self.get_log_level("logging", "level")? {
            config.console_level = level;
        }
        if let Some(format) = self.get_value("logging", "format") {
            config.format = format.parse::<LogFormat>().map_err(anyhow::Error::msg)?;
        }
        if let Some(file) = self.get_path("logging", "file") {
            config.file_level = Some(self.get_log_level("logging", "file-level")?.unwrap_or(log::LevelFilter::Info));
            config.destination = LogDestination::Both(file);
        }
        Ok(config)
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("rumkit").join("rumkit.toml"));
    }

    paths.push(PathBuf::from("./rumkit.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse().context("Failed to parse TOML content")?;

    let mut config = Configuration::new();
    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }
    Ok(config)
}

/// Flatten nested tables into `section.subsection` names
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        let section_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(subtable) if subtable.values().all(|v| !v.is_table()) => {
                let section = subtable
                    .iter()
                    .map(|(subkey, subvalue)| (subkey.clone(), toml_value_to_string(subvalue)))
                    .collect();
                config.insert(section_name, section);
            }
            Value::Table(subtable) => flatten_toml_table(subtable, section_name, config),
            _ => {
                // Top-level scalars land in the unnamed section
                config
                    .entry(prefix.clone())
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

/// Convert TOML Value to string representation; arrays become comma lists
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Array(items) => items.iter().map(toml_value_to_string).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
