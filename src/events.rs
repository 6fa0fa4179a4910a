//! Provider lifecycle events — the narrow subscribe interface around the
//! controller-owned mutation state.
//!
//! Listeners are `Arc<dyn Fn(&T)>`; emission iterates a snapshot taken
//! under the lock and released before any callback runs, so listeners may
//! subscribe or unsubscribe from inside a callback without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::MutateStatus;

/// Lifecycle events emitted by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The shared `is_mutating` flag changed.
    MutatingChanged(bool),
    /// A mutation reached its terminal status.
    MutationSettled { status: MutateStatus },
}

/// Token returned by `subscribe`, used to unsubscribe.
pub type SubscriptionId = u64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Typed synchronous event emitter.
pub struct EventEmitter<T> {
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener and return its subscription token.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Safe to call with a stale token.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(sid, _)| *sid != id);
    }

    /// Emit `event` to the listeners registered at the time of the call.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, listener)| Arc::clone(listener)).collect()
        };
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
