//! Windowed fingerprint cache

use std::collections::HashMap;

use log::trace;

use crate::clock::{system_clock, SharedClock};

/// Default suppression window
pub const DEFAULT_DEDUP_WINDOW_MS: i64 = 10_000;

/// Cache size above which stale entries are swept
pub const DEFAULT_SOFT_CAP: usize = 200;

/// Deduplicator tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupConfig {
    pub window_ms: i64,
    pub soft_cap: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_DEDUP_WINDOW_MS,
            soft_cap: DEFAULT_SOFT_CAP,
        }
    }
}

/// Suppresses repeats of the same fingerprint inside a sliding window
pub struct FingerprintDeduplicator {
    config: DedupConfig,
    clock: SharedClock,
    last_seen: HashMap<String, i64>,
}

impl FingerprintDeduplicator {
    /// Deduplicator with the default window on the system clock
    pub fn new() -> Self {
        Self::with_clock(DedupConfig::default(), system_clock())
    }

    pub fn with_clock(config: DedupConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            last_seen: HashMap::new(),
        }
    }

    /// Returns true when `key` was allowed less than one window ago.
    ///
    /// A suppressed call does not refresh the entry, so a condition that
    /// keeps firing is reported again once per window.
    pub fn should_suppress(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        if let Some(&last) = self.last_seen.get(key) {
            if now - last < self.config.window_ms {
                trace!("Suppressing duplicate fingerprint {}", key);
                return true;
            }
        }

        self.last_seen.insert(key.to_string(), now);
        if self.last_seen.len() > self.config.soft_cap {
            self.evict_stale(now);
        }
        false
    }

    fn evict_stale(&mut self, now: i64) {
        let cutoff = now - self.config.window_ms * 2;
        let before = self.last_seen.len();
        self.last_seen.retain(|_, seen| *seen >= cutoff);
        trace!(
            "Fingerprint sweep evicted {} of {} entries",
            before - self.last_seen.len(),
            before
        );
    }

    /// Number of fingerprints currently remembered
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn config(&self) -> DedupConfig {
        self.config
    }
}

impl Default for FingerprintDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}
