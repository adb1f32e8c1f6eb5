//! Mutation hub
//!
//! Host-side registry of listeners consulted before domain mutations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::Result;

use super::{MutationEvent, MutationListener};

/// Something a dump session can subscribe its gate to
pub trait MutationSource: Send + Sync {
    /// Register `listener` until the returned handle is dropped
    fn subscribe(&self, listener: Arc<dyn MutationListener>) -> Subscription;
}

/// Registration handle; unsubscribes when dropped
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Build a handle running `cancel` exactly once on drop
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribe now
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

/// Listener registry a host calls before each mutation
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct MutationHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    listeners: RwLock<Vec<(u64, Arc<dyn MutationListener>)>>,
    next_id: AtomicU64,
}

impl MutationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult every listener; the first veto aborts the mutation
    pub fn before_mutation(&self, event: &MutationEvent) -> Result<()> {
        // Snapshot first: a Suspend listener may block for the whole dump and
        // must not hold the registry lock while it does.
        let listeners: Vec<Arc<dyn MutationListener>> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener.before_mutation(event)?;
        }
        Ok(())
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

impl MutationSource for MutationHub {
    fn subscribe(&self, listener: Arc<dyn MutationListener>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, listener));

        let hub: Weak<HubInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(hub) = hub.upgrade() {
                hub.listeners.write().retain(|(other, _)| *other != id);
            }
        })
    }
}
