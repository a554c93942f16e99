//! Client Facade
//!
//! `Client` wires a `RuntimeContext`, a `Transport`, the producers and the
//! host lifecycle into one handle. Construction fails on missing identity;
//! a constructed client is always fully set up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::error::RumResult;
use crate::event::Event;
use crate::lifecycle::{LifecycleHub, ListenerId, SharedLifecycle};
use crate::plugin::builtin::{ConsolePlugin, ErrorPlugin, ErrorReporter, LifecyclePlugin, Navigator, RoutePlugin};
use crate::plugin::{BoxedPlugin, PluginManager, SetupReport};
use crate::runtime::{ContextOptions, RuntimeContext, SharedContext};
use crate::transport::{
    FlushOutcome, SharedStore, SharedStrategy, Subscription, Transport, TransportConfig,
};

/// Crate version reported by `Client::version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long `destroy` waits for in-flight deliveries
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Built-in producers to enable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub error: bool,
    pub route: bool,
    pub console: bool,
    pub lifecycle: bool,
    /// Report panics through the error producer
    pub capture_panics: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            error: true,
            route: true,
            console: false,
            lifecycle: false,
            capture_panics: false,
        }
    }
}

/// Everything needed to construct a client
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub context: ContextOptions,
    pub transport: TransportConfig,
    pub features: Features,
    /// Location the route producer starts from
    pub initial_url: Option<String>,
}

impl ClientOptions {
    pub fn new<A: Into<String>, R: Into<String>>(app_id: A, release: R) -> Self {
        Self {
            context: ContextOptions::new(app_id, release),
            ..Self::default()
        }
    }

    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.transport.endpoint = Some(endpoint.into());
        self
    }

    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }
}

/// Builder for `Client` with injectable collaborators
pub struct ClientBuilder {
    options: ClientOptions,
    strategies: Option<Vec<SharedStrategy>>,
    store: Option<SharedStore>,
    clock: Option<SharedClock>,
    lifecycle: Option<SharedLifecycle>,
    navigator: Option<Navigator>,
    settle_timeout: Duration,
    plugins: Vec<BoxedPlugin>,
}

impl ClientBuilder {
    /// Replace the delivery chain
    pub fn strategies(mut self, strategies: Vec<SharedStrategy>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Backlog storage
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Lifecycle hub the host emits into
    pub fn lifecycle(mut self, lifecycle: SharedLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Navigator followed by the route producer
    pub fn navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Register an extra producer after the built-in ones
    pub fn plugin(mut self, plugin: BoxedPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Validate, construct and set up. Must run inside a Tokio runtime.
    pub fn build(self) -> RumResult<Client> {
        let options = self.options;
        options.context.validate()?;

        let context = RuntimeContext::shared(&options.context);
        let mut transport = Transport::builder(context.app_id(), context.release(), options.transport.clone());
        if let Some(strategies) = self.strategies {
            transport = transport.strategies(strategies);
        }
        if let Some(store) = self.store {
            transport = transport.store(store);
        }
        if let Some(clock) = self.clock {
            transport = transport.clock(clock);
        }
        let transport = transport.build()?;

        let lifecycle = self.lifecycle.unwrap_or_else(LifecycleHub::shared);
        let navigator = self
            .navigator
            .unwrap_or_else(|| Navigator::new(options.initial_url.clone().unwrap_or_default()));

        let features = &options.features;
        let mut plugins = PluginManager::new();
        let mut errors = None;
        if features.error {
            let plugin = ErrorPlugin::new().capture_panics(features.capture_panics);
            errors = Some(plugin.reporter());
            plugins.register(Box::new(plugin));
        }
        if features.route {
            plugins.register(Box::new(RoutePlugin::new(navigator.clone(), Arc::clone(&lifecycle))));
        }
        if features.console {
            plugins.register(Box::new(ConsolePlugin::new()));
        }
        if features.lifecycle {
            plugins.register(Box::new(LifecyclePlugin::new(Arc::clone(&lifecycle))));
        }
        for plugin in self.plugins {
            plugins.register(plugin);
        }

        let setup = plugins.setup_all(&context, &transport);
        let listener = register_teardown_flush(&lifecycle, &transport);

        info!(
            "rumkit {} client initialised for {}@{} (session {})",
            VERSION,
            context.app_id(),
            context.release(),
            context.session_id()
        );

        Ok(Client {
            context,
            transport,
            plugins: Mutex::new(plugins),
            setup,
            lifecycle,
            listener: Mutex::new(Some(listener)),
            navigator,
            errors,
            settle_timeout: self.settle_timeout,
            destroyed: AtomicBool::new(false),
        })
    }
}

/// Page hide or hidden visibility drains the queue immediately
fn register_teardown_flush(lifecycle: &SharedLifecycle, transport: &Arc<Transport>) -> ListenerId {
    let transport = Arc::downgrade(transport);
    lifecycle.add_listener(move |event| {
        if !event.is_teardown() {
            return;
        }
        if let Some(transport) = transport.upgrade() {
            let handed_off = transport.flush_now(true);
            debug!("Lifecycle {:?} flushed {} events", event, handed_off);
        }
    })
}

/// The external telemetry handle
pub struct Client {
    context: SharedContext,
    transport: Arc<Transport>,
    plugins: Mutex<PluginManager>,
    setup: SetupReport,
    lifecycle: SharedLifecycle,
    listener: Mutex<Option<ListenerId>>,
    navigator: Navigator,
    errors: Option<ErrorReporter>,
    settle_timeout: Duration,
    destroyed: AtomicBool,
}

impl Client {
    /// Construct with the built-in collaborators
    pub fn init(options: ClientOptions) -> RumResult<Client> {
        Self::builder(options).build()
    }

    pub fn builder(options: ClientOptions) -> ClientBuilder {
        ClientBuilder {
            options,
            strategies: None,
            store: None,
            clock: None,
            lifecycle: None,
            navigator: None,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            plugins: Vec::new(),
        }
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub fn track(&self, event: Event) {
        self.transport.track(event);
    }

    pub async fn flush(&self, urgent: bool) -> FlushOutcome {
        self.transport.flush(urgent).await
    }

    pub fn set_user_id<S: Into<String>>(&self, user_id: Option<S>) {
        self.context.set_user_id(user_id.map(Into::into));
    }

    /// Merge into the session tags
    pub fn set_tags<I, K, V>(&self, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.context.set_tags(tags);
    }

    /// Observe every tracked event
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.transport.subscribe(callback)
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn lifecycle(&self) -> &SharedLifecycle {
        &self.lifecycle
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Error reporting handle when the error producer is enabled
    pub fn errors(&self) -> Option<&ErrorReporter> {
        self.errors.as_ref()
    }

    /// Registered producer names in registration order
    pub fn plugins(&self) -> Vec<String> {
        self.plugins.lock().list()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.lock().has(name)
    }

    /// Result of producer setup at construction
    pub fn setup_report(&self) -> &SetupReport {
        &self.setup
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Unhook lifecycle listeners, tear producers down newest first, then
    /// deliver what is left. Calling it again does nothing.
    pub async fn destroy(&self) -> FlushOutcome {
        if !self.shutdown() {
            return FlushOutcome::Empty;
        }
        let outcome = self.transport.flush(true).await;
        self.transport.settle(self.settle_timeout).await;
        info!("rumkit client destroyed ({} events in final flush)", outcome.events());
        outcome
    }

    /// Synchronous part of teardown; returns false if already done
    fn shutdown(&self) -> bool {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(listener) = self.listener.lock().take() {
            self.lifecycle.remove_listener(listener);
        }
        let failures = self.plugins.lock().teardown_all();
        if !failures.is_empty() {
            warn!("{} plugins failed to tear down cleanly", failures.len());
        }
        true
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.shutdown() {
            let handed_off = self.transport.flush_now(true);
            debug!("Client dropped without destroy; {} events handed off", handed_off);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("app_id", &self.context.app_id())
            .field("release", &self.context.release())
            .field("session_id", &self.context.session_id())
            .field("plugins", &self.plugins())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
