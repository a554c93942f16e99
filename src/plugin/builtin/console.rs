//! Log Capture Producer
//!
//! Forwards `warn` and `error` log records from the host application as
//! `console` events. Records logged by rumkit itself are never forwarded.

use std::sync::Arc;

use log::{debug, Level};

use crate::dedup::truncate;
use crate::event::Event;
use crate::logging::{console_tap, LogTap, TappedRecord};
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::interceptor::{InstallGuard, Interceptor};
use crate::plugin::traits::{Plugin, SharedTransport};
use crate::runtime::SharedContext;

pub const CONSOLE_PLUGIN_NAME: &str = "console";

/// Longest forwarded message
pub const MAX_CONSOLE_CHARS: usize = 1000;

const OWN_TARGET: &str = "rumkit";

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET || target.starts_with("rumkit::")
}

pub struct ConsolePlugin {
    tap: Interceptor<LogTap>,
    guard: Option<InstallGuard<LogTap>>,
}

impl ConsolePlugin {
    /// Capture through the process-wide logger tap
    pub fn new() -> Self {
        Self::with_tap(console_tap())
    }

    pub fn with_tap(tap: Interceptor<LogTap>) -> Self {
        Self { tap, guard: None }
    }
}

impl Default for ConsolePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ConsolePlugin {
    fn name(&self) -> &str {
        CONSOLE_PLUGIN_NAME
    }

    fn setup(&mut self, context: &SharedContext, transport: &SharedTransport) -> PluginResult<()> {
        if self.guard.is_some() {
            return Err(PluginError::invalid_state("console plugin is already set up"));
        }

        let context = Arc::clone(context);
        let transport = Arc::clone(transport);
        let guard = self.tap.install_with(move |below| {
            Arc::new(move |record: &TappedRecord| {
                if record.level <= Level::Warn && !is_own_target(&record.target) {
                    let level = if record.level == Level::Error { "error" } else { "warn" };
                    transport.track(
                        Event::new("console")
                            .with("level", level)
                            .with("target", record.target.as_str())
                            .with("message", truncate(&record.message, MAX_CONSOLE_CHARS))
                            .with("pageId", context.page_id()),
                    );
                }
                if let Some(next) = below.get() {
                    next(record);
                }
            })
        });
        self.guard = Some(guard);
        debug!("Console capture attached");
        Ok(())
    }

    fn teardown(&mut self) -> PluginResult<()> {
        if let Some(guard) = self.guard.take() {
            guard.restore();
            debug!("Console capture detached");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::tests::mock_plugins::{recording_transport, tracked_types};
    use crate::runtime::{ContextOptions, RuntimeContext};

    fn record(level: Level, target: &str, message: &str) -> TappedRecord {
        TappedRecord {
            level,
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    fn emit(tap: &Interceptor<LogTap>, record: TappedRecord) {
        if let Some(current) = tap.current() {
            current(&record);
        }
    }

    #[tokio::test]
    async fn test_forwards_warnings_and_errors_only() {
        let tap: Interceptor<LogTap> = Interceptor::new();
        let context = RuntimeContext::shared(&ContextOptions::new("app", "1.0.0"));
        let (transport, sink) = recording_transport();
        let mut plugin = ConsolePlugin::with_tap(tap.clone());
        plugin.setup(&context, &transport).unwrap();

        emit(&tap, record(Level::Info, "app", "started"));
        emit(&tap, record(Level::Warn, "app::cache", "cache miss storm"));
        emit(&tap, record(Level::Error, "app::db", &"x".repeat(3000)));
        emit(&tap, record(Level::Error, "rumkit::transport", "delivery failed"));

        assert_eq!(tracked_types(&sink), vec!["console", "console"]);
        let events = sink.lock();
        assert_eq!(events[0].get("level").unwrap(), "warn");
        assert_eq!(events[1].get("level").unwrap(), "error");
        assert_eq!(events[1].get("message").unwrap().as_str().unwrap().len(), MAX_CONSOLE_CHARS);
    }

    #[tokio::test]
    async fn test_previous_tap_still_called_and_restored() {
        let tap: Interceptor<LogTap> = Interceptor::new();
        let previous_calls = Arc::new(parking_lot::Mutex::new(0usize));
        let counter = previous_calls.clone();
        let _base = tap.install(Arc::new(move |_: &TappedRecord| *counter.lock() += 1));

        let context = RuntimeContext::shared(&ContextOptions::new("app", "1.0.0"));
        let (transport, sink) = recording_transport();
        let mut plugin = ConsolePlugin::with_tap(tap.clone());
        plugin.setup(&context, &transport).unwrap();

        emit(&tap, record(Level::Warn, "app", "one"));
        plugin.teardown().unwrap();
        emit(&tap, record(Level::Warn, "app", "two"));

        assert_eq!(*previous_calls.lock(), 2);
        assert_eq!(sink.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_teardown_detaches_both() {
        let tap: Interceptor<LogTap> = Interceptor::new();
        let context = RuntimeContext::shared(&ContextOptions::new("app", "1.0.0"));
        let (first_transport, first_sink) = recording_transport();
        let (second_transport, second_sink) = recording_transport();
        let mut first = ConsolePlugin::with_tap(tap.clone());
        let mut second = ConsolePlugin::with_tap(tap.clone());
        first.setup(&context, &first_transport).unwrap();
        second.setup(&context, &second_transport).unwrap();

        emit(&tap, record(Level::Warn, "app", "both"));
        first.teardown().unwrap();
        emit(&tap, record(Level::Warn, "app", "second only"));
        second.teardown().unwrap();
        emit(&tap, record(Level::Warn, "app", "nobody"));

        assert!(!tap.is_installed());
        assert_eq!(first_sink.lock().len(), 1);
        assert_eq!(second_sink.lock().len(), 2);
    }
}
