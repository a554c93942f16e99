//! Plugin System
//!
//! Producers observe something and report it through the transport. The
//! `PluginManager` registers them once by name and drives their setup and
//! teardown with per-producer failure isolation.
//!
//! ```no_run
//! use rumkit::plugin::{Plugin, PluginManager, PluginResult, SharedTransport};
//! use rumkit::runtime::SharedContext;
//! use rumkit::event::Event;
//!
//! struct Heartbeat;
//!
//! impl Plugin for Heartbeat {
//!     fn name(&self) -> &str {
//!         "heartbeat"
//!     }
//!
//!     fn setup(&mut self, _context: &SharedContext, transport: &SharedTransport) -> PluginResult<()> {
//!         transport.track(Event::new("heartbeat"));
//!         Ok(())
//!     }
//! }
//!
//! let mut manager = PluginManager::new();
//! manager.register(Box::new(Heartbeat));
//! ```

pub mod builtin;
pub mod error;
pub mod interceptor;
pub mod manager;
pub mod traits;

#[cfg(test)]
pub mod tests;

pub use error::{PluginError, PluginResult};
pub use interceptor::{Below, InstallGuard, Interceptor};
pub use manager::{PluginManager, SetupReport};
pub use traits::{BoxedPlugin, Plugin, SharedTransport};
