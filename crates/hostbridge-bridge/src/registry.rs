//! Pending-request bookkeeping for transports without native correlation.
//!
//! Ids are the lowest integer not currently held, so a long-running guest
//! keeps reusing small ids instead of counting upwards forever. An id that
//! is present in the registry is never handed out again until its entry is
//! removed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hostbridge_codec::{decode, Value};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

/// Default cap on simultaneously pending requests.
pub const DEFAULT_MAX_PENDING: usize = 8192;

/// Completion callback for one pending request.
pub type Resolver = Box<dyn FnOnce(Result<Vec<Value>>) + Send>;

/// Receiving half handed out by [`CorrelationRegistry::register_waiter`].
pub type ReplyReceiver = oneshot::Receiver<Result<Vec<Value>>>;

/// Registry limits.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of pending requests. Registration fails beyond this.
    pub max_pending: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl RegistryConfig {
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }
}

/// Maps request ids to the callers waiting on them.
pub struct CorrelationRegistry {
    pending: Mutex<BTreeMap<u32, Resolver>>,
    config: RegistryConfig,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u32, Resolver>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The lowest id not currently pending.
    ///
    /// The id is not reserved. Use [`register_next`](Self::register_next)
    /// when another thread may register concurrently.
    pub fn allocate(&self) -> Result<u32> {
        let pending = self.lock();
        self.check_capacity(&pending)?;
        lowest_free(&pending).ok_or(BridgeError::TooManyPending(self.config.max_pending))
    }

    /// Register a resolver under an explicit id.
    pub fn register(&self, id: u32, resolver: Resolver) -> Result<()> {
        let mut pending = self.lock();
        if pending.contains_key(&id) {
            return Err(BridgeError::IdInUse(id));
        }
        self.check_capacity(&pending)?;
        pending.insert(id, resolver);
        debug!(id, pending = pending.len(), "registered pending request");
        Ok(())
    }

    /// Allocate the lowest free id and register `resolver` under it.
    pub fn register_next(&self, resolver: Resolver) -> Result<u32> {
        let mut pending = self.lock();
        self.check_capacity(&pending)?;
        let id = lowest_free(&pending).ok_or(BridgeError::TooManyPending(self.config.max_pending))?;
        pending.insert(id, resolver);
        debug!(id, pending = pending.len(), "registered pending request");
        Ok(id)
    }

    /// Allocate an id and return a channel that completes when it resolves.
    pub fn register_waiter(&self) -> Result<(u32, ReplyReceiver)> {
        let (tx, rx) = oneshot::channel();
        let id = self.register_next(Box::new(move |reply| {
            // The caller may have stopped waiting.
            let _ = tx.send(reply);
        }))?;
        Ok((id, rx))
    }

    /// Decode `reply` and hand it to the request registered under `id`.
    ///
    /// Returns `false` (and logs) when nothing is waiting on `id`.
    pub fn resolve(&self, id: u32, reply: &[u8]) -> bool {
        match self.take(id) {
            Some(resolver) => {
                resolver(decode(reply).map_err(BridgeError::from));
                true
            }
            None => {
                warn!(id, "reply for unknown request id; dropping");
                false
            }
        }
    }

    /// Complete the request under `id` with an error.
    pub fn fail(&self, id: u32, error: BridgeError) -> bool {
        match self.take(id) {
            Some(resolver) => {
                resolver(Err(error));
                true
            }
            None => {
                warn!(id, %error, "failure for unknown request id; dropping");
                false
            }
        }
    }

    /// Drop the request under `id` without completing it.
    pub fn release(&self, id: u32) -> bool {
        self.take(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Currently pending ids, ascending.
    pub fn pending_ids(&self) -> Vec<u32> {
        self.lock().keys().copied().collect()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // Resolvers run after the lock is released so they can re-enter.
    fn take(&self, id: u32) -> Option<Resolver> {
        self.lock().remove(&id)
    }

    fn check_capacity(&self, pending: &BTreeMap<u32, Resolver>) -> Result<()> {
        if pending.len() >= self.config.max_pending {
            warn!(
                max_pending = self.config.max_pending,
                "pending request cap reached; rejecting request"
            );
            return Err(BridgeError::TooManyPending(self.config.max_pending));
        }
        Ok(())
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CorrelationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationRegistry")
            .field("pending", &self.pending_ids())
            .field("config", &self.config)
            .finish()
    }
}

fn lowest_free(pending: &BTreeMap<u32, Resolver>) -> Option<u32> {
    let mut candidate = 0u32;
    for &id in pending.keys() {
        if id != candidate {
            break;
        }
        candidate = candidate.checked_add(1)?;
    }
    Some(candidate)
}
