//! Instance storage by lifetime: one singleton tier and a stack of scoped tiers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{DiError, DiResult};
use crate::AnyArc;

#[cfg(feature = "ahash")]
type Map<V> = ahash::AHashMap<String, V>;
#[cfg(not(feature = "ahash"))]
type Map<V> = std::collections::HashMap<String, V>;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Instances cached for one scope.
pub struct ScopeTier {
    id: u64,
    opened_at: Instant,
    instances: Map<AnyArc>,
}

impl ScopeTier {
    fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            opened_at: Instant::now(),
            instances: Map::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Summary returned by [`ScopeRegistry::end_scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndedScope {
    pub id: u64,
    /// Instances released with the tier.
    pub released: usize,
    /// Depth remaining after the pop.
    pub remaining_depth: usize,
    pub lifetime_ms: u128,
}

/// Where a cached instance was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLocation {
    Singleton,
    /// Scoped tier at this depth (1 is the outermost scope).
    Scoped(usize),
}

/// Two-tier instance store.
///
/// The singleton tier is shared with every handle forked from the same
/// container; the scope stack belongs to this registry alone. Neither lock
/// is held while user code runs. Singleton construction is serialized per id
/// through [`ScopeRegistry::singleton_init_lock`].
pub struct ScopeRegistry {
    singletons: Arc<Mutex<Map<AnyArc>>>,
    init_locks: Arc<Mutex<Map<Arc<Mutex<()>>>>>,
    scopes: Mutex<Vec<ScopeTier>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self {
            singletons: Arc::new(Mutex::new(Map::default())),
            init_locks: Arc::new(Mutex::new(Map::default())),
            scopes: Mutex::new(Vec::new()),
        }
    }

    /// New registry sharing this one's singleton tier with an empty scope stack.
    pub fn fork(&self) -> Self {
        Self {
            singletons: self.singletons.clone(),
            init_locks: self.init_locks.clone(),
            scopes: Mutex::new(Vec::new()),
        }
    }

    /// Pushes an empty scoped tier and returns the new depth.
    pub fn begin_scope(&self) -> usize {
        self.open_scope().1
    }

    /// Pushes an empty scoped tier and returns its id and the new depth.
    pub fn open_scope(&self) -> (u64, usize) {
        let tier = ScopeTier::new();
        let id = tier.id;
        let mut scopes = self.scopes.lock();
        scopes.push(tier);
        (id, scopes.len())
    }

    /// Closes scope `id` together with any scopes still open inside it,
    /// innermost first. Returns `None` when `id` is no longer open.
    pub fn end_scopes_through(&self, id: u64) -> Option<Vec<EndedScope>> {
        let (closed, base_depth) = {
            let mut scopes = self.scopes.lock();
            let position = scopes.iter().position(|tier| tier.id == id)?;
            (scopes.split_off(position), position)
        };
        let ended = closed
            .into_iter()
            .enumerate()
            .rev()
            .map(|(offset, tier)| EndedScope {
                id: tier.id,
                released: tier.instances.len(),
                remaining_depth: base_depth + offset,
                lifetime_ms: tier.opened_at.elapsed().as_millis(),
            })
            .collect();
        Some(ended)
    }

    /// Pops the innermost tier, releasing its instances.
    ///
    /// Calling this with no active scope is a request-lifecycle bug and
    /// always returns [`DiError::ScopeUnderflow`].
    pub fn end_scope(&self) -> DiResult<EndedScope> {
        let (tier, remaining_depth) = {
            let mut scopes = self.scopes.lock();
            let tier = scopes.pop();
            (tier, scopes.len())
        };
        match tier {
            Some(tier) => Ok(EndedScope {
                id: tier.id,
                released: tier.instances.len(),
                remaining_depth,
                lifetime_ms: tier.opened_at.elapsed().as_millis(),
            }),
            None => {
                tracing::error!("end_scope called without a matching begin_scope");
                Err(DiError::ScopeUnderflow)
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.lock().len()
    }

    pub fn in_scope(&self) -> bool {
        self.depth() > 0
    }

    /// Id of the innermost active scope.
    pub fn current_scope_id(&self) -> Option<u64> {
        self.scopes.lock().last().map(ScopeTier::id)
    }

    /// True if `id` is cached in the singleton tier or any active scope.
    pub fn has(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    pub fn locate(&self, id: &str) -> Option<CacheLocation> {
        {
            let scopes = self.scopes.lock();
            if let Some(index) = scopes.iter().rposition(|tier| tier.instances.contains_key(id)) {
                return Some(CacheLocation::Scoped(index + 1));
            }
        }
        self.singletons
            .lock()
            .contains_key(id)
            .then_some(CacheLocation::Singleton)
    }

    /// Cached instance, innermost scope first, then singletons.
    pub fn get(&self, id: &str) -> Option<AnyArc> {
        {
            let scopes = self.scopes.lock();
            if let Some(found) = scopes.iter().rev().find_map(|tier| tier.instances.get(id)) {
                return Some(found.clone());
            }
        }
        self.singletons.lock().get(id).cloned()
    }

    pub fn singleton(&self, id: &str) -> Option<AnyArc> {
        self.singletons.lock().get(id).cloned()
    }

    /// Lock guarding construction of singleton `id`, shared by every fork.
    ///
    /// Hold it from the cache miss until the instance is stored and re-check
    /// the tier once it is acquired. Re-entry for the same id on one thread is
    /// rejected as circular before the lock is taken.
    pub fn singleton_init_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.init_locks
            .lock()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Stores a constructed singleton. If another thread stored one first,
    /// that instance is kept and returned instead.
    pub fn store_singleton(&self, id: &str, instance: AnyArc) -> AnyArc {
        self.singletons
            .lock()
            .entry(id.to_string())
            .or_insert(instance)
            .clone()
    }

    /// Stores a pre-built instance, replacing whatever was cached.
    pub fn put_singleton(&self, id: &str, instance: AnyArc) -> Option<AnyArc> {
        self.singletons.lock().insert(id.to_string(), instance)
    }

    /// Stores a scoped instance in the innermost scope, keeping an existing one.
    pub fn store_scoped(&self, id: &str, instance: AnyArc) -> DiResult<AnyArc> {
        let mut scopes = self.scopes.lock();
        let tier = scopes.last_mut().ok_or_else(|| DiError::NoActiveScope { id: id.to_string() })?;
        Ok(tier.instances.entry(id.to_string()).or_insert(instance).clone())
    }

    /// Stores a scoped instance in the innermost scope, replacing an existing one.
    pub fn put_scoped(&self, id: &str, instance: AnyArc) -> DiResult<()> {
        let mut scopes = self.scopes.lock();
        let tier = scopes.last_mut().ok_or_else(|| DiError::NoActiveScope { id: id.to_string() })?;
        tier.instances.insert(id.to_string(), instance);
        Ok(())
    }

    /// Removes `id` from the singleton tier and every active scope.
    pub fn forget(&self, id: &str) -> bool {
        let mut removed = self.singletons.lock().remove(id).is_some();
        for tier in self.scopes.lock().iter_mut() {
            removed |= tier.instances.remove(id).is_some();
        }
        removed
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.lock().len()
    }

    /// Instances across all active scopes.
    pub fn scoped_count(&self) -> usize {
        self.scopes.lock().iter().map(ScopeTier::len).sum()
    }

    /// Drops every singleton and every active scope.
    pub fn clear(&self) {
        let singletons = std::mem::take(&mut *self.singletons.lock());
        let scopes = std::mem::take(&mut *self.scopes.lock());
        drop(singletons);
        drop(scopes);
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("singletons", &self.singleton_count())
            .field("depth", &self.depth())
            .field("scoped", &self.scoped_count())
            .finish()
    }
}
