//! rumkit: client-side telemetry pipeline
//!
//! Producers (`plugin`) turn host activity into events, the `transport`
//! batches and delivers them with a fallback chain and an offline backlog,
//! and `client` wires everything together behind one facade.

pub mod app;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod logging;
pub mod plugin;
pub mod runtime;
pub mod transport;

pub use client::{Client, ClientBuilder, ClientOptions, Features, VERSION};
pub use error::{RumError, RumResult};
pub use event::{Envelope, Event};
pub use lifecycle::{LifecycleEvent, LifecycleHub, Visibility};
pub use runtime::{ContextOptions, RuntimeContext};
pub use transport::{FlushOutcome, Transport, TransportConfig};
