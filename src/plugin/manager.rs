//! Plugin Manager
//!
//! Owns the ordered list of producers and drives their setup and teardown
//! against one context/transport pair. A failing or panicking producer is
//! logged and skipped; the others always run.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error, info, warn};

use super::error::{PluginError, PluginResult};
use super::traits::{BoxedPlugin, SharedTransport};
use crate::runtime::SharedContext;

/// Outcome of `setup_all`
#[derive(Debug, Default)]
pub struct SetupReport {
    /// Producers whose setup succeeded, in order
    pub ready: Vec<String>,
    /// Producers whose setup failed, with the error
    pub failed: Vec<(String, PluginError)>,
}

impl SetupReport {
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registration-ordered producer registry
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<BoxedPlugin>,
    installed: HashSet<String>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer. Unnamed producers and duplicate names are
    /// ignored with a warning; the first registration of a name wins.
    /// Returns whether the producer was added.
    pub fn register(&mut self, plugin: BoxedPlugin) -> bool {
        let name = plugin.name().to_string();
        if name.trim().is_empty() {
            warn!("Ignoring plugin without a name");
            return false;
        }
        if self.installed.contains(&name) {
            warn!("Plugin '{}' already registered, skipping", name);
            return false;
        }

        debug!("Registered plugin '{}'", name);
        self.installed.insert(name);
        self.plugins.push(plugin);
        true
    }

    /// Set up every producer in registration order
    pub fn setup_all(&mut self, context: &SharedContext, transport: &SharedTransport) -> SetupReport {
        let mut report = SetupReport::default();
        for plugin in self.plugins.iter_mut() {
            let name = plugin.name().to_string();
            match guarded(&name, || plugin.setup(context, transport)) {
                Ok(()) => {
                    debug!("Plugin '{}' set up", name);
                    report.ready.push(name);
                }
                Err(e) => {
                    error!("Plugin '{}' setup failed: {}", name, e);
                    report.failed.push((name, e));
                }
            }
        }
        info!(
            "Plugins set up: {} ready, {} failed",
            report.ready.len(),
            report.failed.len()
        );
        report
    }

    /// Tear every producer down, newest first, then clear the registry.
    /// Returns the teardown failures.
    pub fn teardown_all(&mut self) -> Vec<(String, PluginError)> {
        let mut failures = Vec::new();
        for mut plugin in self.plugins.drain(..).rev() {
            let name = plugin.name().to_string();
            match guarded(&name, || plugin.teardown()) {
                Ok(()) => debug!("Plugin '{}' torn down", name),
                Err(e) => {
                    error!("Plugin '{}' teardown failed: {}", name, e);
                    failures.push((name, e));
                }
            }
        }
        self.installed.clear();
        failures
    }

    pub fn has(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Registered names in registration order
    pub fn list(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Run a producer hook, turning a panic into an error
fn guarded<F>(name: &str, hook: F) -> PluginResult<()>
where
    F: FnOnce() -> PluginResult<()>,
{
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::panicked(name, payload.as_ref())),
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager").field("plugins", &self.list()).finish()
    }
}
