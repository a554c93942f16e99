//! Capability Interception
//!
//! An `Interceptor` is a slot holding a stack of installed implementations of
//! some capability (a log tap, a navigation hook). The top layer is the one
//! callers see. Installing returns an `InstallGuard` that removes exactly its
//! own layer on `restore` or drop, wherever that layer sits in the stack, so
//! teardown order between independent installers does not matter.
//!
//! Wrappers reach the implementation beneath them through `Below`, which is
//! resolved at call time. Removing a middle layer unlinks it from the chain.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

struct Layer<T: ?Sized> {
    id: u64,
    value: Arc<T>,
}

struct Layers<T: ?Sized> {
    next_id: u64,
    stack: Vec<Layer<T>>,
}

impl<T: ?Sized> Layers<T> {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

type Slot<T> = Arc<RwLock<Layers<T>>>;

/// Replaceable capability slot
pub struct Interceptor<T: ?Sized> {
    slot: Slot<T>,
}

impl<T: ?Sized> Interceptor<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Layers {
                next_id: 0,
                stack: Vec::new(),
            })),
        }
    }

    /// Slot pre-filled with a permanent base implementation
    pub fn with_base(base: Arc<T>) -> Self {
        let interceptor = Self::new();
        {
            let mut layers = interceptor.slot.write();
            let id = layers.allocate();
            layers.stack.push(Layer { id, value: base });
        }
        interceptor
    }

    /// Currently installed implementation
    pub fn current(&self) -> Option<Arc<T>> {
        self.slot.read().stack.last().map(|layer| Arc::clone(&layer.value))
    }

    pub fn is_installed(&self) -> bool {
        !self.slot.read().stack.is_empty()
    }

    /// Number of installed layers
    pub fn depth(&self) -> usize {
        self.slot.read().stack.len()
    }

    /// Install `replacement` on top of the current implementation
    pub fn install(&self, replacement: Arc<T>) -> InstallGuard<T> {
        self.install_with(|_| replacement)
    }

    /// Install a wrapper that may delegate to whatever lies beneath it
    pub fn install_with<F>(&self, wrap: F) -> InstallGuard<T>
    where
        F: FnOnce(Below<T>) -> Arc<T>,
    {
        let id = self.slot.write().allocate();
        let value = wrap(Below {
            slot: Arc::downgrade(&self.slot),
            id,
        });
        self.slot.write().stack.push(Layer { id, value });
        InstallGuard {
            slot: Arc::clone(&self.slot),
            id: Some(id),
        }
    }
}

impl<T: ?Sized> Default for Interceptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Interceptor<T> {
    /// Clones share the same slot
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Interceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor").field("depth", &self.depth()).finish()
    }
}

/// Handle to the layer beneath an installed wrapper
pub struct Below<T: ?Sized> {
    slot: Weak<RwLock<Layers<T>>>,
    id: u64,
}

impl<T: ?Sized> Below<T> {
    /// Implementation directly beneath the wrapper right now. `None` when the
    /// wrapper is the bottom layer or has already been removed.
    pub fn get(&self) -> Option<Arc<T>> {
        let slot = self.slot.upgrade()?;
        let layers = slot.read();
        let position = layers.stack.iter().position(|layer| layer.id == self.id)?;
        position
            .checked_sub(1)
            .map(|below| Arc::clone(&layers.stack[below].value))
    }
}

impl<T: ?Sized> fmt::Debug for Below<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Below").field("id", &self.id).finish()
    }
}

/// Removes its layer when restored or dropped
#[must_use = "dropping the guard immediately removes the installed layer"]
pub struct InstallGuard<T: ?Sized> {
    slot: Slot<T>,
    id: Option<u64>,
}

impl<T: ?Sized> InstallGuard<T> {
    /// Remove this guard's layer, leaving every other layer in place
    pub fn restore(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(id) = self.id.take() {
            // Dropped outside the lock; the value may own other guards.
            let removed = {
                let mut layers = self.slot.write();
                let position = layers.stack.iter().position(|layer| layer.id == id);
                position.map(|position| layers.stack.remove(position))
            };
            drop(removed);
        }
    }
}

impl<T: ?Sized> Drop for InstallGuard<T> {
    fn drop(&mut self) {
        self.remove();
    }
}

impl<T: ?Sized> fmt::Debug for InstallGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallGuard").field("pending", &self.id.is_some()).finish()
    }
}
