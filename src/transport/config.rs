//! Transport Configuration
//!
//! Batching thresholds, delivery chain and backlog limits.

use std::time::Duration;

use super::backlog::DEFAULT_BACKLOG_CAPACITY;
use super::strategy::{StrategyKind, StrategySettings};

/// Queue length that forces an immediate urgent flush
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Quiescence delay before a debounced flush
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(2000);

/// Bounded wait for pixel delivery
pub const DEFAULT_PIXEL_WAIT: Duration = Duration::from_millis(1200);

/// Largest payload handed to the beacon strategy
pub const DEFAULT_BEACON_MAX_BYTES: usize = 64 * 1024;

/// Per-request timeout for the POST strategy
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Collector URL; `None` means development mode (nothing is sent)
    pub endpoint: Option<String>,
    pub batch_size: usize,
    pub flush_delay: Duration,
    pub backlog_capacity: usize,
    pub strategies: Vec<StrategyKind>,
    pub beacon_max_bytes: usize,
    pub request_timeout: Duration,
    pub pixel_wait: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_delay: DEFAULT_FLUSH_DELAY,
            backlog_capacity: DEFAULT_BACKLOG_CAPACITY,
            strategies: StrategyKind::default_chain(),
            beacon_max_bytes: DEFAULT_BEACON_MAX_BYTES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pixel_wait: DEFAULT_PIXEL_WAIT,
        }
    }
}

impl TransportConfig {
    /// Default settings pointed at a collector
    pub fn with_endpoint<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn strategy_settings(&self) -> StrategySettings {
        StrategySettings {
            beacon_max_bytes: self.beacon_max_bytes,
            request_timeout: self.request_timeout,
            pixel_wait: self.pixel_wait,
        }
    }

    /// Validate transport configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("Batch size must be greater than 0".to_string());
        }

        if self.backlog_capacity == 0 {
            return Err("Backlog capacity must be greater than 0".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            if endpoint.trim().is_empty() {
                return Err("Endpoint must not be blank".to_string());
            }
        }

        Ok(())
    }
}
