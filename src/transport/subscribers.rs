//! Event fan-out to external observers
//!
//! Every ingested event is handed to each subscriber synchronously, whether
//! or not it is ever delivered. A panicking subscriber is logged and skipped.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, error};
use parking_lot::Mutex;

use crate::event::Event;

/// Observer callback
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

type Entries = Mutex<Vec<(u64, EventCallback)>>;

thread_local! {
    static DEFERRED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Whether this thread is currently notifying observers of an event that was
/// tracked with deferred notification
pub fn in_deferred_notification() -> bool {
    DEFERRED_DEPTH.with(|depth| depth.get() > 0)
}

struct DeferredScope;

impl DeferredScope {
    fn enter() -> Self {
        DEFERRED_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DeferredScope
    }
}

impl Drop for DeferredScope {
    fn drop(&mut self) {
        DEFERRED_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Ordered set of observers
#[derive(Default)]
pub struct SubscriberSet {
    entries: Arc<Entries>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; keep the `Subscription` to remove it later
    pub fn subscribe(&self, callback: EventCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, callback));
        debug!("Event subscriber {} registered", id);
        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Deliver an event to every observer registered at call time
    pub fn emit(&self, event: &Event) {
        let snapshot: Vec<(u64, EventCallback)> = self.entries.lock().clone();
        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!("Event subscriber {} panicked; continuing with the rest", id);
            }
        }
    }

    /// `emit` with `in_deferred_notification` reporting true for its duration
    pub fn emit_deferred(&self, event: &Event) {
        let _scope = DeferredScope::enter();
        self.emit(event);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping it does not unsubscribe; call `unsubscribe` explicitly.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    entries: Weak<Entries>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove exactly this observer. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(entries) = self.entries.upgrade() else {
            return false;
        };
        let mut entries = entries.lock();
        let before = entries.len();
        entries.retain(|(id, _)| *id != self.id);
        let removed = entries.len() != before;
        if removed {
            debug!("Event subscriber {} removed", self.id);
        }
        removed
    }
}
