//! Fan-out of unsolicited host pushes to listeners keyed by type.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::error::Result;
use crate::push::PushEnvelope;

/// Callback invoked with the message of a push.
pub type Listener = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`NotificationBus::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Maps notification types to listener sets.
///
/// Listeners are called synchronously from [`dispatch`](Self::dispatch),
/// in no particular order, outside of the bus lock.
pub struct NotificationBus {
    listeners: RwLock<HashMap<String, HashMap<ListenerId, Listener>>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for pushes of `kind`.
    pub fn add_listener<F>(&self, kind: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let kind = kind.into();
        trace!(kind = %kind, ?id, "adding listener");
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .insert(id, Arc::new(callback));
        id
    }

    /// Remove a listener. The type entry goes away with its last listener.
    pub fn remove_listener(&self, kind: &str, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(set) = listeners.get_mut(kind) else {
            return false;
        };
        let removed = set.remove(&id).is_some();
        if set.is_empty() {
            listeners.remove(kind);
        }
        removed
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, HashMap::len)
    }

    /// Types with at least one listener, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Deliver `message` to every listener of `kind`.
    ///
    /// Returns the number of listeners called. A push nobody listens for is
    /// logged and dropped.
    pub fn dispatch(&self, kind: &str, message: &str) -> usize {
        let targets: Vec<Listener> = match self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
        {
            Some(set) => set.values().cloned().collect(),
            None => Vec::new(),
        };

        if targets.is_empty() {
            debug!(kind, "no listeners for push; dropping");
            return 0;
        }

        for listener in &targets {
            listener(message);
        }
        targets.len()
    }

    /// Parse a JSON push envelope and dispatch it.
    pub fn dispatch_envelope(&self, raw: &str) -> Result<usize> {
        let envelope = PushEnvelope::parse(raw)?;
        Ok(self.dispatch(&envelope.kind, &envelope.message))
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("types", &self.types())
            .finish()
    }
}
