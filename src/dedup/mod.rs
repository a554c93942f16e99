//! Fingerprint Deduplication
//!
//! Producers reduce a recurring condition to a normalized fingerprint and ask
//! a `FingerprintDeduplicator` whether it was already reported inside the
//! sliding window. Each producer owns its own deduplicator.

pub mod cache;
pub mod fingerprint;

pub use cache::{DedupConfig, FingerprintDeduplicator, DEFAULT_DEDUP_WINDOW_MS, DEFAULT_SOFT_CAP};
pub use fingerprint::{basename, fingerprint, first_lines, hash32, truncate};
