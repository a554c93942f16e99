//! Error Capture Producer
//!
//! Reports errors handed to an `ErrorReporter`, and optionally panics, as
//! `error`, `res-error` and `panic` events. Repeats of the same condition
//! within the dedup window are suppressed.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::panic;
use std::sync::{Arc, OnceLock};

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use super::urls::sanitize_url;
use crate::dedup::{basename, fingerprint, first_lines, truncate, FingerprintDeduplicator};
use crate::event::Event;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::interceptor::{InstallGuard, Interceptor};
use crate::plugin::traits::{Plugin, SharedTransport};
use crate::runtime::SharedContext;
use crate::transport::in_deferred_notification;

pub const ERROR_PLUGIN_NAME: &str = "error";

/// Longest message kept
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Longest stack kept
pub const MAX_STACK_CHARS: usize = 2000;

const MAX_FILENAME_CHARS: usize = 300;
const FINGERPRINT_STACK_LINES: usize = 5;

/// Where an error was raised
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new<S: Into<String>>(file: S, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl From<&panic::Location<'_>> for SourceLocation {
    fn from(location: &panic::Location<'_>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

struct Attachment {
    context: SharedContext,
    transport: SharedTransport,
}

struct ReporterState {
    attachment: RwLock<Option<Attachment>>,
    dedup: Mutex<FingerprintDeduplicator>,
}

/// Handle for reporting errors into the pipeline.
///
/// Cloneable; every clone reports through the same producer. Calls made while
/// the producer is not set up are dropped and return `false`.
#[derive(Clone)]
pub struct ErrorReporter {
    state: Arc<ReporterState>,
}

impl ErrorReporter {
    fn new(dedup: FingerprintDeduplicator) -> Self {
        Self {
            state: Arc::new(ReporterState {
                attachment: RwLock::new(None),
                dedup: Mutex::new(dedup),
            }),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state.attachment.read().is_some()
    }

    /// Report an error value; its `source` chain becomes the stack
    pub fn capture_error(&self, error: &(dyn std::error::Error + 'static)) -> bool {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        self.capture_message(&error.to_string(), None, &chain.join("\n"))
    }

    /// Report a message with an optional location and stack text
    pub fn capture_message(&self, message: &str, location: Option<SourceLocation>, stack: &str) -> bool {
        self.report("error", message, location.unwrap_or_default(), stack)
    }

    /// Report a resource that failed to load
    pub fn capture_resource(&self, tag: &str, url: &str) -> bool {
        let guard = self.state.attachment.read();
        let Some(attachment) = guard.as_ref() else {
            return false;
        };

        let tag = tag.to_uppercase();
        let url = sanitize_url(url, attachment.context.allow_params(), false);
        if self.suppressed(&fingerprint(&[&tag, &url])) {
            return false;
        }
        attachment.transport.track(
            Event::new("res-error")
                .with("tag", tag)
                .with("url", url)
                .with("pageId", attachment.context.page_id()),
        );
        true
    }

    fn capture_panic(&self, info: &PanicDetails) -> bool {
        self.record("panic", &info.message, info.location.clone(), &info.backtrace, Notify::Deferred)
    }

    fn report(&self, kind: &str, message: &str, location: SourceLocation, stack: &str) -> bool {
        self.record(kind, message, location, stack, Notify::Inline)
    }

    fn record(&self, kind: &str, message: &str, location: SourceLocation, stack: &str, notify: Notify) -> bool {
        let guard = self.state.attachment.read();
        let Some(attachment) = guard.as_ref() else {
            trace!("Error reporter not attached; dropping {}", kind);
            return false;
        };

        let message = truncate(message, MAX_MESSAGE_CHARS);
        let filename = truncate(&location.file, MAX_FILENAME_CHARS);
        let stack = truncate(stack, MAX_STACK_CHARS);

        let line = location.line.to_string();
        let column = location.column.to_string();
        let lines = first_lines(&stack, FINGERPRINT_STACK_LINES);
        let key = fingerprint(&[&message, basename(&filename), &line, &column, &lines]);
        if self.suppressed(&key) {
            debug!("Suppressed repeated {} ({})", kind, key);
            return false;
        }

        let event = Event::new(kind)
            .with("message", message)
            .with("filename", filename)
            .with("lineno", location.line)
            .with("colno", location.column)
            .with("stack", stack)
            .with("pageId", attachment.context.page_id());
        match notify {
            Notify::Inline => attachment.transport.track(event),
            Notify::Deferred => attachment.transport.track_deferred(event),
        }
        true
    }

    fn suppressed(&self, key: &str) -> bool {
        self.state.dedup.lock().should_suppress(key)
    }

    fn attach(&self, context: &SharedContext, transport: &SharedTransport) {
        *self.state.attachment.write() = Some(Attachment {
            context: Arc::clone(context),
            transport: Arc::clone(transport),
        });
    }

    fn detach(&self) {
        self.state.attachment.write().take();
    }
}

/// How subscribers learn about a reported event
#[derive(Clone, Copy)]
enum Notify {
    Inline,
    /// From a background task; a panic hook must not run observer code
    Deferred,
}

struct PanicDetails {
    message: String,
    location: SourceLocation,
    backtrace: String,
}

impl PanicDetails {
    fn from_info(info: &panic::PanicHookInfo<'_>) -> Self {
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self {
            message,
            location: info.location().map(SourceLocation::from).unwrap_or_default(),
            backtrace: captured_backtrace(),
        }
    }
}

fn captured_backtrace() -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        _ => String::new(),
    }
}

type PanicHook = dyn Fn(&panic::PanicHookInfo<'_>) + Sync + Send + 'static;

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

/// Layers of panic reporters behind one process-wide hook. The hook that was
/// active before the first installation stays at the bottom and is always
/// called last.
fn panic_layers() -> &'static Interceptor<PanicHook> {
    static LAYERS: OnceLock<Interceptor<PanicHook>> = OnceLock::new();
    LAYERS.get_or_init(|| {
        let previous: Arc<PanicHook> = Arc::from(panic::take_hook());
        let layers = Interceptor::with_base(previous);
        let dispatch = layers.clone();
        panic::set_hook(Box::new(move |info: &panic::PanicHookInfo<'_>| {
            if let Some(hook) = dispatch.current() {
                hook(info);
            }
        }));
        layers
    })
}

/// Report one panic unless this thread is already reporting or is notifying
/// observers of an earlier panic report
fn report_panic(reporter: &ErrorReporter, info: &panic::PanicHookInfo<'_>) {
    if in_deferred_notification() || CAPTURING.with(|capturing| capturing.replace(true)) {
        return;
    }
    reporter.capture_panic(&PanicDetails::from_info(info));
    CAPTURING.with(|capturing| capturing.set(false));
}

/// Panic reporting layer; removed on restore or drop
struct PanicHookGuard {
    layer: InstallGuard<PanicHook>,
}

impl PanicHookGuard {
    fn install(reporter: ErrorReporter) -> Self {
        let layer = panic_layers().install_with(move |below| {
            Arc::new(move |info: &panic::PanicHookInfo<'_>| {
                report_panic(&reporter, info);
                if let Some(next) = below.get() {
                    next(info);
                }
            })
        });
        Self { layer }
    }

    fn restore(self) {
        self.layer.restore();
    }
}

/// Error capture producer
pub struct ErrorPlugin {
    reporter: ErrorReporter,
    capture_panics: bool,
    panic_hook: Option<PanicHookGuard>,
}

impl ErrorPlugin {
    pub fn new() -> Self {
        Self::with_deduplicator(FingerprintDeduplicator::new())
    }

    pub fn with_deduplicator(dedup: FingerprintDeduplicator) -> Self {
        Self {
            reporter: ErrorReporter::new(dedup),
            capture_panics: false,
            panic_hook: None,
        }
    }

    /// Also report panics through a chained panic hook
    pub fn capture_panics(mut self, enabled: bool) -> Self {
        self.capture_panics = enabled;
        self
    }

    /// Reporting handle; valid before setup and after teardown (as a no-op)
    pub fn reporter(&self) -> ErrorReporter {
        self.reporter.clone()
    }
}

impl Default for ErrorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ErrorPlugin {
    fn name(&self) -> &str {
        ERROR_PLUGIN_NAME
    }

    fn setup(&mut self, context: &SharedContext, transport: &SharedTransport) -> PluginResult<()> {
        if self.reporter.is_attached() {
            return Err(PluginError::invalid_state("error plugin is already set up"));
        }
        transport.track(Event::new("__plugin_loaded").with("plugin", ERROR_PLUGIN_NAME));
        self.reporter.attach(context, transport);

        if self.capture_panics {
            self.panic_hook = Some(PanicHookGuard::install(self.reporter.clone()));
            debug!("Panic capture installed");
        }
        Ok(())
    }

    fn teardown(&mut self) -> PluginResult<()> {
        if let Some(hook) = self.panic_hook.take() {
            hook.restore();
            debug!("Panic capture removed");
        }
        self.reporter.detach();
        Ok(())
    }
}
