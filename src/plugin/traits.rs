//! Core Plugin Traits
//!
//! The producer contract. A producer observes some signal and reports what it
//! sees through `Transport::track`.

use std::sync::Arc;

use super::error::PluginResult;
use crate::runtime::SharedContext;
use crate::transport::Transport;

/// Shared transport handle given to producers
pub type SharedTransport = Arc<Transport>;

/// Event producer interface
///
/// `setup` is called once and must attach every listener or hook the producer
/// needs. `teardown` must reverse every side effect of `setup`. Both are
/// synchronous; a producer that needs async work spawns it.
pub trait Plugin: Send {
    /// Unique producer name
    fn name(&self) -> &str;

    /// Attach to the session
    fn setup(&mut self, context: &SharedContext, transport: &SharedTransport) -> PluginResult<()>;

    /// Detach from the session
    fn teardown(&mut self) -> PluginResult<()> {
        Ok(())
    }
}

/// Boxed producer as held by the manager
pub type BoxedPlugin = Box<dyn Plugin>;
