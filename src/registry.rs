//! Sharded registry of per-request locale decisions.
//!
//! The registry carries the resolved locale from the negotiation
//! middleware to whatever renders the response, without threading it
//! through every call. Requests are short-lived and high-volume, so the
//! map is split into fixed shards with independent locks; one flat lock
//! here would serialize every in-flight request.
//!
//! Request identity is a monotonically assigned sequence number, never a
//! memory address, so a completed request's identity can never be
//! confused with a new one. Entries must be removed at request end on
//! every exit path; [`RegistryGuard`] ties removal to scope exit.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use unic_langid::LanguageIdentifier;

const SHARD_COUNT: usize = 32;

/// Opaque identity of one in-flight request. Not valid after the request
/// completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Shard = RwLock<HashMap<u64, LanguageIdentifier>>;

/// Concurrent map from request identity to resolved locale.
///
/// Every operation touches exactly one shard's lock, so operations on
/// different shards proceed fully in parallel and no cross-shard lock
/// ordering ever arises. Constructed once at service start and injected
/// where needed; there is no process-global instance.
pub struct RequestRegistry {
    shards: Vec<Shard>,
    next_id: AtomicU64,
}

impl RequestRegistry {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards,
            next_id: AtomicU64::new(1),
        }
    }

    /// Assign a fresh request identity.
    pub fn next_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Shard selection only needs distribution quality, not strength, so
    /// the standard hasher is plenty.
    fn shard(&self, id: RequestId) -> &Shard {
        let mut hasher = DefaultHasher::new();
        id.0.hash(&mut hasher);
        let slot = (hasher.finish() % SHARD_COUNT as u64) as usize;
        &self.shards[slot]
    }

    /// Associate a resolved locale with a request identity.
    pub fn add(&self, id: RequestId, locale: LanguageIdentifier) {
        self.shard(id).write().unwrap().insert(id.0, locale);
    }

    /// Look up a request's locale. A missing identity is not an error.
    pub fn get(&self, id: RequestId) -> Option<LanguageIdentifier> {
        self.shard(id).read().unwrap().get(&id.0).cloned()
    }

    /// Drop a request's association. Removing an absent identity is a no-op.
    pub fn remove(&self, id: RequestId) {
        self.shard(id).write().unwrap().remove(&id.0);
    }

    /// Number of in-flight associations across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assign an identity, store the locale, and return a guard that
    /// removes the entry when dropped. This is the request-lifecycle entry
    /// point; the guard covers normal completion, early return and panic
    /// unwind alike.
    pub fn register(self: &Arc<Self>, locale: LanguageIdentifier) -> RegistryGuard {
        let id = self.next_id();
        self.add(id, locale);
        RegistryGuard {
            registry: Arc::clone(self),
            id,
        }
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped handle to one registry entry; dropping it removes the entry.
pub struct RegistryGuard {
    registry: Arc<RequestRegistry>,
    id: RequestId,
}

impl RegistryGuard {
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
