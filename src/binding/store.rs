//! Reader-writer locked store of registered bindings.

use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{Binding, BindingId};
use crate::key::TypeKey;

#[derive(Default)]
struct StoreInner {
    by_service: AHashMap<TypeId, Vec<Arc<Binding>>>,
    open: AHashMap<(&'static str, usize), Vec<Arc<Binding>>>,
}

impl StoreInner {
    fn bucket_mut(&mut self, service: &TypeKey) -> &mut Vec<Arc<Binding>> {
        if service.is_open() {
            let family = (service.family().unwrap_or_default(), service.arity());
            self.open.entry(family).or_default()
        } else {
            self.by_service.entry(service.id()).or_default()
        }
    }

    fn bucket(&self, service: &TypeKey) -> Option<&Vec<Arc<Binding>>> {
        if service.is_open() {
            let family = (service.family().unwrap_or_default(), service.arity());
            self.open.get(&family)
        } else {
            self.by_service.get(&service.id())
        }
    }
}

/// Mapping from service type to its bindings, in registration order.
///
/// Lookups take a read lock and clone the matching `Arc<Binding>`s out, so
/// resolution never holds the lock while user code runs. Mutations take
/// effect for subsequent lookups only; instances already cached are not
/// touched.
#[derive(Default)]
pub struct BindingStore {
    inner: RwLock<StoreInner>,
}

impl BindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, binding: Arc<Binding>) -> BindingId {
        let id = binding.id();
        debug!(binding = %binding.describe(), "adding binding");
        self.inner.write().bucket_mut(binding.service()).push(binding);
        id
    }

    /// Removes one binding; returns whether it was present.
    pub fn remove(&self, id: BindingId) -> bool {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let buckets = inner.by_service.values_mut().chain(inner.open.values_mut());
        for bucket in buckets {
            if let Some(pos) = bucket.iter().position(|b| b.id() == id) {
                let removed = bucket.remove(pos);
                debug!(binding = %removed.describe(), "removed binding");
                return true;
            }
        }
        false
    }

    /// Removes every binding (explicit and implicit) for `service`.
    pub fn unbind(&self, service: &TypeKey) -> usize {
        let removed = {
            let mut inner = self.inner.write();
            std::mem::take(inner.bucket_mut(service))
        };
        if !removed.is_empty() {
            debug!(service = service.name(), count = removed.len(), "unbound service");
        }
        removed.len()
    }

    /// Replaces every binding of the binding's service with `binding`.
    pub fn rebind(&self, binding: Arc<Binding>) -> BindingId {
        let id = binding.id();
        let mut inner = self.inner.write();
        let bucket = inner.bucket_mut(binding.service());
        let replaced = bucket.len();
        bucket.clear();
        debug!(binding = %binding.describe(), replaced, "rebinding service");
        bucket.push(binding);
        id
    }

    /// Bindings applicable to a closed `service`: exact registrations
    /// plus open-generic ones of the same family and arity, in
    /// registration order.
    pub fn bindings_for(&self, service: &TypeKey) -> Vec<Arc<Binding>> {
        let inner = self.inner.read();
        let mut found: Vec<Arc<Binding>> = inner.bucket(service).cloned().unwrap_or_default();
        if let Some(family) = service.family().filter(|_| !service.is_open()) {
            if let Some(open) = inner.open.get(&(family, service.arity())) {
                found.extend(open.iter().cloned());
                found.sort_by_key(|b| b.id());
            }
        }
        found
    }

    /// Open-generic bindings of `family`, any arity, in registration order.
    pub fn open_generic_for(&self, family: &str) -> Vec<Arc<Binding>> {
        let inner = self.inner.read();
        let mut found: Vec<Arc<Binding>> = inner
            .open
            .iter()
            .filter(|((name, _), _)| *name == family)
            .flat_map(|(_, bindings)| bindings.iter().cloned())
            .collect();
        found.sort_by_key(|b| b.id());
        found
    }

    /// Stores an implicit self-binding unless one already exists for the service.
    pub(crate) fn add_implicit(&self, binding: Binding) -> Arc<Binding> {
        let mut inner = self.inner.write();
        let bucket = inner.bucket_mut(binding.service());
        if let Some(existing) = bucket.iter().find(|b| b.is_implicit()) {
            return existing.clone();
        }
        debug!(service = binding.service().name(), "synthesized implicit self-binding");
        let binding = Arc::new(binding);
        bucket.push(binding.clone());
        binding
    }

    pub fn get(&self, id: BindingId) -> Option<Arc<Binding>> {
        let inner = self.inner.read();
        inner
            .by_service
            .values()
            .chain(inner.open.values())
            .flatten()
            .find(|b| b.id() == id)
            .cloned()
    }

    /// Every binding, in registration order.
    pub fn all(&self) -> Vec<Arc<Binding>> {
        let inner = self.inner.read();
        let mut all: Vec<Arc<Binding>> = inner
            .by_service
            .values()
            .chain(inner.open.values())
            .flatten()
            .cloned()
            .collect();
        all.sort_by_key(|b| b.id());
        all
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.by_service.values().chain(inner.open.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ClosedGeneric;

    struct Alpha;
    struct Beta;

    #[test]
    fn add_remove_unbind() {
        let store = BindingStore::new();
        let first = store.add(Arc::new(Binding::bind::<Alpha>().to_self().build()));
        let second = store.add(Arc::new(Binding::bind::<Alpha>().to_self().build()));
        store.add(Arc::new(Binding::bind::<Beta>().to_self().build()));

        let ids: Vec<_> = store.bindings_for(&TypeKey::of::<Alpha>()).iter().map(|b| b.id()).collect();
        assert_eq!(ids, [first, second]);

        assert!(store.remove(first));
        assert!(!store.remove(first));
        assert_eq!(store.bindings_for(&TypeKey::of::<Alpha>()).len(), 1);

        assert_eq!(store.unbind(&TypeKey::of::<Alpha>()), 1);
        assert!(store.bindings_for(&TypeKey::of::<Alpha>()).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rebind_replaces_existing_bindings() {
        let store = BindingStore::new();
        store.add(Arc::new(Binding::bind::<Alpha>().to_self().build()));
        store.add(Arc::new(Binding::bind::<Alpha>().to_self().build()));
        let id = store.rebind(Arc::new(Binding::bind::<Alpha>().to_self().named("only").build()));

        let bindings = store.bindings_for(&TypeKey::of::<Alpha>());
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].id(), id);
        assert!(store.get(id).is_some());
    }

    #[test]
    fn implicit_bindings_are_added_once() {
        let store = BindingStore::new();
        let a = store.add_implicit(Binding::implicit(TypeKey::of::<Alpha>()));
        let b = store.add_implicit(Binding::implicit(TypeKey::of::<Alpha>()));
        assert_eq!(a.id(), b.id());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn open_generic_bindings_join_closed_lookups() {
        use crate::key::Generic;
        use std::marker::PhantomData;

        struct Box1<T>(PhantomData<T>);
        impl<T: 'static> Generic for Box1<T> {
            const FAMILY: &'static str = "Box1";
            fn type_arguments() -> Vec<TypeKey> {
                vec![TypeKey::of::<T>()]
            }
        }

        let store = BindingStore::new();
        store.add(Arc::new(
            Binding::open_generic("Box1", 1, |_| Some(ClosedGeneric::new::<Alpha, Alpha>(|a| a))).build(),
        ));
        store.add(Arc::new(Binding::open_generic("Box1", 2, |_| None).build()));

        assert_eq!(store.bindings_for(&TypeKey::of_generic::<Box1<u8>>()).len(), 1);
        assert!(store.bindings_for(&TypeKey::of::<Box1<u8>>()).is_empty());
        assert_eq!(store.bindings_for(&TypeKey::open("Box1", 1)).len(), 1);
        assert_eq!(store.open_generic_for("Box1").len(), 2);
        assert!(store.open_generic_for("Box2").is_empty());
    }
}
