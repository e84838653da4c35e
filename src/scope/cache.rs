//! Per-scope instance cache.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::ScopeObject;
use crate::activation::{Context, InstanceReference};
use crate::binding::BindingId;
use crate::error::DiResult;
use crate::key::TypeKey;

/// A cached activation: the context it was created under and its instance.
pub struct CacheEntry {
    pub context: Arc<Context>,
    pub reference: InstanceReference,
    sequence: u64,
}

/// Outcome of [`Cache::get_or_create`].
pub enum Lookup {
    /// Already cached in this scope
    Hit(InstanceReference),
    /// Constructed by this call and now cached, but not yet activated
    Created(InstanceReference),
    /// Another caller published first; `loser` was never cached or
    /// activated
    Raced {
        winner: InstanceReference,
        loser: CacheEntry,
    },
    /// The scope ended while the instance was being constructed
    Uncached(CacheEntry),
}

/// One binding may serve several closed services (open generics).
type Slot = (BindingId, TypeId);

#[derive(Default)]
struct Entries {
    closed: bool,
    map: AHashMap<Slot, CacheEntry>,
}

struct ScopeTable {
    scope: Weak<dyn std::any::Any + Send + Sync>,
    entries: Mutex<Entries>,
}

impl ScopeTable {
    fn is_for(&self, scope: &ScopeObject) -> bool {
        self.scope
            .upgrade()
            .is_some_and(|live| address(&live) == address(scope))
    }

    fn is_dead(&self) -> bool {
        self.scope.strong_count() == 0
    }

    fn close(&self) -> Vec<CacheEntry> {
        let mut entries = self.entries.lock();
        entries.closed = true;
        entries.map.drain().map(|(_, entry)| entry).collect()
    }
}

fn address(scope: &ScopeObject) -> usize {
    Arc::as_ptr(scope) as *const () as usize
}

fn newest_first(mut entries: Vec<CacheEntry>) -> Vec<CacheEntry> {
    entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
    entries
}

/// Maps scope objects to the instances cached under them.
///
/// One table per live scope object, created lazily and keyed by the
/// object's address. Tables hold their scope only weakly: a dropped scope
/// leaves a dead table behind that [`prune`](Cache::prune) collects.
/// Explicit [`end_scope`](Cache::end_scope) is the reliable path.
///
/// Each table has its own lock, so resolutions in unrelated scopes do not
/// contend. Construction never runs under a lock; when two callers race to
/// create the same (binding, scope) instance the first to publish wins.
/// Instances are published as soon as they are constructed, before the
/// caller activates them, so lookups made during activation find them.
/// A caller whose activation fails takes its entry back with
/// [`retract`](Cache::retract).
///
/// Operations that evict return the evicted entries, newest first, so the
/// caller can deactivate them after every lock is released.
#[derive(Default)]
pub struct Cache {
    tables: Mutex<AHashMap<usize, Arc<ScopeTable>>>,
    orphans: Mutex<Vec<Arc<ScopeTable>>>,
    sequence: AtomicU64,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_table(&self, scope: &ScopeObject) -> Option<Arc<ScopeTable>> {
        self.tables
            .lock()
            .get(&address(scope))
            .filter(|table| table.is_for(scope))
            .cloned()
    }

    fn table(&self, scope: &ScopeObject) -> Arc<ScopeTable> {
        let key = address(scope);
        let mut tables = self.tables.lock();
        if let Some(table) = tables.get(&key) {
            if table.is_for(scope) {
                return table.clone();
            }
        }
        // Address reuse: the previous owner of this address has died.
        if let Some(stale) = tables.remove(&key) {
            self.orphans.lock().push(stale);
        }
        let table = Arc::new(ScopeTable {
            scope: Arc::downgrade(scope),
            entries: Mutex::new(Entries::default()),
        });
        tables.insert(key, table.clone());
        table
    }

    /// The instance cached for `binding` serving `service` in `scope`, if any.
    pub fn try_get(&self, scope: &ScopeObject, binding: BindingId, service: &TypeKey) -> Option<InstanceReference> {
        let table = self.existing_table(scope)?;
        let entries = table.entries.lock();
        entries
            .map
            .get(&(binding, service.id()))
            .map(|entry| entry.reference.clone())
    }

    /// Returns the instance cached for `binding` serving `service` in
    /// `scope`, constructing it with `create` on a miss.
    pub fn get_or_create<F>(
        &self,
        scope: &ScopeObject,
        binding: BindingId,
        service: &TypeKey,
        create: F,
    ) -> DiResult<Lookup>
    where
        F: FnOnce() -> DiResult<(Arc<Context>, InstanceReference)>,
    {
        let slot = (binding, service.id());
        let table = self.table(scope);
        if let Some(entry) = table.entries.lock().map.get(&slot) {
            trace!(binding = %binding, "cache hit");
            return Ok(Lookup::Hit(entry.reference.clone()));
        }

        trace!(binding = %binding, "cache miss");
        let (context, reference) = create()?;
        let entry = CacheEntry {
            context,
            reference: reference.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };

        let mut entries = table.entries.lock();
        if entries.closed {
            warn!(binding = %binding, "scope ended during construction; instance not cached");
            return Ok(Lookup::Uncached(entry));
        }
        if let Some(existing) = entries.map.get(&slot) {
            trace!(binding = %binding, "lost construction race");
            return Ok(Lookup::Raced {
                winner: existing.reference.clone(),
                loser: entry,
            });
        }
        entries.map.insert(slot, entry);
        Ok(Lookup::Created(reference))
    }

    /// Removes the entry published for `reference`, if it is still cached.
    ///
    /// Entries of other instances in the same slot are left alone.
    pub fn retract(
        &self,
        scope: &ScopeObject,
        binding: BindingId,
        service: &TypeKey,
        reference: &InstanceReference,
    ) -> Option<CacheEntry> {
        let slot = (binding, service.id());
        let table = self.existing_table(scope)?;
        let mut entries = table.entries.lock();
        if !entries.map.get(&slot)?.reference.is(&reference.service) {
            return None;
        }
        trace!(binding = %binding, "retracting cached instance");
        entries.map.remove(&slot)
    }

    /// Evicts every instance cached under `scope`.
    pub fn end_scope(&self, scope: &ScopeObject) -> Vec<CacheEntry> {
        let table = {
            let mut tables = self.tables.lock();
            let key = address(scope);
            match tables.get(&key) {
                Some(table) if table.is_for(scope) => tables.remove(&key),
                _ => None,
            }
        };
        table.map(|t| newest_first(t.close())).unwrap_or_default()
    }

    /// Evicts every entry for which `evict` returns true.
    pub fn release<P>(&self, mut evict: P) -> Vec<CacheEntry>
    where
        P: FnMut(&CacheEntry) -> bool,
    {
        let tables: Vec<Arc<ScopeTable>> = self.tables.lock().values().cloned().collect();
        let mut released = Vec::new();
        for table in tables {
            let mut entries = table.entries.lock();
            let slots: Vec<Slot> = entries
                .map
                .iter()
                .filter(|(_, entry)| evict(entry))
                .map(|(slot, _)| *slot)
                .collect();
            released.extend(slots.iter().filter_map(|slot| entries.map.remove(slot)));
        }
        newest_first(released)
    }

    /// Evicts the tables of scope objects that are no longer alive.
    pub fn prune(&self) -> Vec<CacheEntry> {
        let mut dead: Vec<Arc<ScopeTable>> = {
            let mut tables = self.tables.lock();
            let keys: Vec<usize> = tables
                .iter()
                .filter(|(_, table)| table.is_dead())
                .map(|(key, _)| *key)
                .collect();
            keys.iter().filter_map(|key| tables.remove(key)).collect()
        };
        dead.append(&mut self.orphans.lock());
        newest_first(dead.iter().flat_map(|table| table.close()).collect())
    }

    /// Evicts everything.
    pub fn clear(&self) -> Vec<CacheEntry> {
        let mut all: Vec<Arc<ScopeTable>> = self.tables.lock().drain().map(|(_, t)| t).collect();
        all.append(&mut self.orphans.lock());
        newest_first(all.iter().flat_map(|table| table.close()).collect())
    }

    /// Number of cached instances across all scopes.
    pub fn len(&self) -> usize {
        let tables: Vec<Arc<ScopeTable>> = self.tables.lock().values().cloned().collect();
        tables.iter().map(|t| t.entries.lock().map.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scope tables currently tracked, dead ones included.
    pub fn scope_count(&self) -> usize {
        self.tables.lock().len() + self.orphans.lock().len()
    }
}
