//! Navigation Producer
//!
//! Follows a `Navigator` and reports page views (`pv`) and the time spent on
//! each page (`route-leave`). Every real URL change starts a new page id.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use url::Url;

use super::urls::sanitize_url;
use crate::dedup::truncate;
use crate::event::Event;
use crate::lifecycle::{ListenerId, SharedLifecycle};
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::interceptor::{InstallGuard, Interceptor};
use crate::plugin::traits::{Plugin, SharedTransport};
use crate::runtime::SharedContext;

pub const ROUTE_PLUGIN_NAME: &str = "route";

const MAX_TITLE_CHARS: usize = 200;

/// How the location changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

/// A completed location change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub kind: NavigationKind,
    pub url: String,
}

/// Hook invoked after every location change
pub type NavigationHook = dyn Fn(&Navigation) + Send + Sync;

#[derive(Debug, Default)]
struct Location {
    url: String,
    referrer: String,
    title: String,
}

/// Host location and history.
///
/// Cloneable; clones share one location and one hook slot.
#[derive(Clone, Debug)]
pub struct Navigator {
    location: Arc<RwLock<Location>>,
    hooks: Interceptor<NavigationHook>,
}

impl Navigator {
    pub fn new<S: Into<String>>(initial_url: S) -> Self {
        Self {
            location: Arc::new(RwLock::new(Location {
                url: initial_url.into(),
                ..Location::default()
            })),
            hooks: Interceptor::new(),
        }
    }

    /// Set the referrer of the initial page
    pub fn with_referrer<S: Into<String>>(self, referrer: S) -> Self {
        self.location.write().referrer = referrer.into();
        self
    }

    pub fn set_title<S: Into<String>>(&self, title: S) {
        self.location.write().title = title.into();
    }

    pub fn title(&self) -> String {
        self.location.read().title.clone()
    }

    pub fn current_url(&self) -> String {
        self.location.read().url.clone()
    }

    pub fn referrer(&self) -> String {
        self.location.read().referrer.clone()
    }

    pub fn push(&self, url: &str) -> String {
        self.navigate(NavigationKind::Push, url)
    }

    pub fn replace(&self, url: &str) -> String {
        self.navigate(NavigationKind::Replace, url)
    }

    /// History traversal to `url`
    pub fn pop(&self, url: &str) -> String {
        self.navigate(NavigationKind::Pop, url)
    }

    /// Slot for observers of location changes
    pub fn hooks(&self) -> &Interceptor<NavigationHook> {
        &self.hooks
    }

    fn navigate(&self, kind: NavigationKind, target: &str) -> String {
        let url = {
            let mut location = self.location.write();
            let resolved = resolve(&location.url, target);
            location.url = resolved.clone();
            resolved
        };
        trace!("Navigation {:?} to {}", kind, url);

        if let Some(hook) = self.hooks.current() {
            hook(&Navigation { kind, url: url.clone() });
        }
        url
    }
}

/// Resolve `target` against `base`, falling back to `target` unchanged
fn resolve(base: &str, target: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(target)) {
        Ok(url) => url.to_string(),
        Err(_) => target.to_string(),
    }
}

struct RouteState {
    current_url: String,
    started: Instant,
    closed: bool,
}

impl RouteState {
    fn dwell_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

struct Attached {
    hook: InstallGuard<NavigationHook>,
    listener: ListenerId,
}

/// Page view producer
pub struct RoutePlugin {
    navigator: Navigator,
    lifecycle: SharedLifecycle,
    keep_hash: bool,
    attached: Option<Attached>,
}

impl RoutePlugin {
    pub fn new(navigator: Navigator, lifecycle: SharedLifecycle) -> Self {
        Self {
            navigator,
            lifecycle,
            keep_hash: true,
            attached: None,
        }
    }

    /// Whether URL fragments are reported
    pub fn keep_hash(mut self, keep: bool) -> Self {
        self.keep_hash = keep;
        self
    }
}

impl Plugin for RoutePlugin {
    fn name(&self) -> &str {
        ROUTE_PLUGIN_NAME
    }

    fn setup(&mut self, context: &SharedContext, transport: &SharedTransport) -> PluginResult<()> {
        if self.attached.is_some() {
            return Err(PluginError::invalid_state("route plugin is already set up"));
        }
        transport.track(Event::new("__plugin_loaded").with("plugin", ROUTE_PLUGIN_NAME));

        let keep_hash = self.keep_hash;
        let current_url = sanitize_url(&self.navigator.current_url(), context.allow_params(), keep_hash);
        let referrer = sanitize_url(&self.navigator.referrer(), context.allow_params(), keep_hash);
        transport.track(page_view(&current_url, &referrer, &self.navigator, context));

        let state = Arc::new(Mutex::new(RouteState {
            current_url,
            started: Instant::now(),
            closed: false,
        }));

        let hook = {
            let state = Arc::clone(&state);
            let context = Arc::clone(context);
            let transport = Arc::clone(transport);
            let navigator = self.navigator.clone();
            self.navigator.hooks().install_with(move |below| {
                Arc::new(move |navigation: &Navigation| {
                    if let Some(next) = below.get() {
                        next(navigation);
                    }
                    let next = sanitize_url(&navigation.url, context.allow_params(), keep_hash);
                    on_url_change(&state, &next, &navigator, &context, &transport);
                })
            })
        };

        let listener = {
            let state = Arc::clone(&state);
            let context = Arc::clone(context);
            let transport = Arc::clone(transport);
            self.lifecycle.add_listener(move |event| {
                if !event.is_teardown() {
                    return;
                }
                let leave = {
                    let mut state = state.lock();
                    if state.closed {
                        return;
                    }
                    state.closed = true;
                    route_leave(&state, &context).with("reason", "hidden")
                };
                transport.track(leave);
            })
        };

        self.attached = Some(Attached { hook, listener });
        debug!("Route tracking attached");
        Ok(())
    }

    fn teardown(&mut self) -> PluginResult<()> {
        if let Some(attached) = self.attached.take() {
            attached.hook.restore();
            self.lifecycle.remove_listener(attached.listener);
            debug!("Route tracking detached");
        }
        Ok(())
    }
}

fn on_url_change(
    state: &Mutex<RouteState>,
    next: &str,
    navigator: &Navigator,
    context: &SharedContext,
    transport: &SharedTransport,
) {
    let (leave, previous) = {
        let mut state = state.lock();
        if next.is_empty() || next == state.current_url {
            return;
        }
        let leave = route_leave(&state, context);
        let previous = std::mem::replace(&mut state.current_url, next.to_string());
        state.started = Instant::now();
        state.closed = false;
        (leave, previous)
    };

    transport.track(leave);
    context.reset_page();
    transport.track(page_view(next, &previous, navigator, context));
}

fn page_view(url: &str, referrer: &str, navigator: &Navigator, context: &SharedContext) -> Event {
    Event::new("pv")
        .with("url", url)
        .with("referrer", referrer)
        .with("title", truncate(&navigator.title(), MAX_TITLE_CHARS))
        .with("pageId", context.page_id())
}

fn route_leave(state: &RouteState, context: &SharedContext) -> Event {
    Event::new("route-leave")
        .with("url", state.current_url.as_str())
        .with("dur", Value::from(state.dwell_ms()))
        .with("pageId", context.page_id())
}
