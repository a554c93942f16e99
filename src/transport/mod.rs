//! Transport
//!
//! Buffering, batching and delivery of telemetry events, with an offline
//! backlog for batches that cannot be shipped.

pub mod backlog;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod strategy;
pub mod subscribers;

pub use backlog::{FileStore, KeyValueStore, MemoryStore, OfflineBacklog, SharedStore, DEFAULT_BACKLOG_CAPACITY, OFFLINE_KEY};
pub use config::TransportConfig;
pub use error::{DeliveryError, DeliveryResult};
pub use pipeline::{FlushOutcome, Transport, TransportBuilder, TransportStats};
pub use strategy::{
    BeaconStrategy, DeliveryRequest, DeliveryStrategy, HttpPostStrategy, PixelStrategy, SharedStrategy, StrategyKind,
};
pub use subscribers::{in_deferred_notification, EventCallback, Subscription};
