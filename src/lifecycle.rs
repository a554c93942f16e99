//! Host Lifecycle Signals
//!
//! A small synchronous hub for the signals a host emits around teardown:
//! the page (or process) going away, visibility changes and restores from a
//! suspended state. The client facade and the built-in producers listen here
//! instead of touching platform hooks directly.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, trace};
use parking_lot::Mutex;

/// Foreground state of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
        }
    }
}

/// Lifecycle signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The host is being torn down
    PageHide,
    VisibilityChange(Visibility),
    /// The host was shown again; `persisted` is set when restored from a suspended snapshot
    PageShow { persisted: bool },
}

impl LifecycleEvent {
    /// Whether this signal means pending data should leave now
    pub fn is_teardown(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::PageHide | LifecycleEvent::VisibilityChange(Visibility::Hidden)
        )
    }
}

/// Listener callback
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Identifies a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Shared hub handle
pub type SharedLifecycle = Arc<LifecycleHub>;

#[derive(Default)]
pub struct LifecycleHub {
    listeners: Mutex<Vec<(ListenerId, LifecycleListener)>>,
    visibility: Mutex<Visibility>,
    next_id: AtomicU64,
}

impl LifecycleHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedLifecycle {
        Arc::new(Self::new())
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        trace!("Lifecycle listener {:?} added", id);
        id
    }

    /// Returns false if the listener was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Record the signal and notify every listener registered at call time
    pub fn emit(&self, event: LifecycleEvent) {
        if let LifecycleEvent::VisibilityChange(state) = event {
            *self.visibility.lock() = state;
        }
        debug!("Lifecycle signal: {:?}", event);

        let snapshot: Vec<(ListenerId, LifecycleListener)> = self.listeners.lock().clone();
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                error!("Lifecycle listener {:?} panicked on {:?}", id, event);
            }
        }
    }

    /// Last reported visibility
    pub fn visibility(&self) -> Visibility {
        *self.visibility.lock()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}
