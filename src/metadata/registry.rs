//! Explicit-registration metadata provider.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::trace;

use super::{
    Arguments, ConstructorDescriptor, LifecycleDescriptor, MemberDescriptor, MemberKind, MetadataProvider,
    ParameterDescriptor,
};
use crate::error::DiResult;
use crate::instance::{self, AnyArc};
use crate::key::{Generic, TypeKey};
use crate::traits::{Dispose, Initialize, Start};

#[derive(Clone, Default)]
struct TypeEntry {
    constructors: Vec<ConstructorDescriptor>,
    members: Vec<MemberDescriptor>,
    lifecycle: LifecycleDescriptor,
}

/// Metadata provider filled by explicit registration.
///
/// Each concrete type declares its constructors, injectable members and
/// lifecycle hooks once, usually next to the type itself. The registry is
/// safe to share and may be extended after the kernel is built; the
/// planner picks up a type's description the first time it plans it.
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{ParameterDescriptor, TypeRegistry, MetadataProvider, TypeKey};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Database { config: Arc<Config> }
///
/// let registry = TypeRegistry::new();
/// registry.register::<Config>()
///     .default_constructor(|| Config { url: "postgres://localhost".into() });
/// registry.register::<Database>()
///     .constructor([ParameterDescriptor::single::<Config>("config")], |args| {
///         Ok(Database { config: args.get::<Config>(0)? })
///     });
///
/// let ctors = registry.describe_constructors(&TypeKey::of::<Database>());
/// assert_eq!(ctors.len(), 1);
/// assert_eq!(ctors[0].arity(), 1);
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    types: RwLock<AHashMap<TypeId, TypeEntry>>,
    payloads: RwLock<AHashMap<TypeId, TypeKey>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or extends) the description of `T`.
    ///
    /// The description is committed when the returned builder is dropped,
    /// so a single chained statement registers the type.
    pub fn register<T: Send + Sync + 'static>(&self) -> TypeBuilder<'_, T> {
        TypeBuilder::new(self, TypeKey::of::<T>())
    }

    /// Like [`register`](Self::register) for a closed generic implementation.
    pub fn register_generic<T: Generic + Send + Sync>(&self) -> TypeBuilder<'_, T> {
        TypeBuilder::new(self, TypeKey::of_generic::<T>())
    }

    /// Whether anything has been registered for `ty`.
    pub fn contains(&self, ty: &TypeKey) -> bool {
        self.types.read().contains_key(&ty.id())
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    fn commit(&self, key: TypeKey, payload: TypeId, entry: TypeEntry) {
        trace!(
            ty = key.name(),
            constructors = entry.constructors.len(),
            members = entry.members.len(),
            "registering type metadata"
        );
        {
            let mut types = self.types.write();
            let slot = types.entry(key.id()).or_default();
            slot.constructors.extend(entry.constructors);
            slot.members.extend(entry.members);
            slot.lifecycle.initializers.extend(entry.lifecycle.initializers);
            slot.lifecycle.starters.extend(entry.lifecycle.starters);
            slot.lifecycle.stoppers.extend(entry.lifecycle.stoppers);
            slot.lifecycle.disposers.extend(entry.lifecycle.disposers);
        }
        self.payloads.write().insert(payload, key);
    }

    fn with_entry<R>(&self, ty: &TypeKey, f: impl FnOnce(&TypeEntry) -> R) -> Option<R> {
        self.types.read().get(&ty.id()).map(f)
    }
}

impl MetadataProvider for TypeRegistry {
    fn describe_constructors(&self, ty: &TypeKey) -> Vec<ConstructorDescriptor> {
        self.with_entry(ty, |e| e.constructors.clone()).unwrap_or_default()
    }

    fn describe_injectable_members(&self, ty: &TypeKey) -> Vec<MemberDescriptor> {
        self.with_entry(ty, |e| e.members.clone()).unwrap_or_default()
    }

    fn describe_lifecycle(&self, ty: &TypeKey) -> LifecycleDescriptor {
        self.with_entry(ty, |e| e.lifecycle.clone()).unwrap_or_default()
    }

    fn key_for_payload(&self, payload: TypeId) -> Option<TypeKey> {
        self.payloads.read().get(&payload).cloned()
    }
}

/// Builder describing one type; commits to the registry on drop.
pub struct TypeBuilder<'a, T: Send + Sync + 'static> {
    registry: &'a TypeRegistry,
    key: TypeKey,
    entry: TypeEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> TypeBuilder<'a, T> {
    fn new(registry: &'a TypeRegistry, key: TypeKey) -> Self {
        Self {
            registry,
            key,
            entry: TypeEntry::default(),
            _marker: PhantomData,
        }
    }

    /// Declares a constructor taking `parameters` in order.
    pub fn constructor<F>(&mut self, parameters: impl IntoIterator<Item = ParameterDescriptor>, build: F) -> &mut Self
    where
        F: Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        let activator = Arc::new(move |args: &Arguments| build(args).map(|value| instance::erase(Arc::new(value))));
        self.entry
            .constructors
            .push(ConstructorDescriptor::new(parameters, activator));
        self
    }

    /// Declares a parameterless constructor.
    pub fn default_constructor<F>(&mut self, build: F) -> &mut Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor([], move |_| Ok(build()))
    }

    /// Declares a member injected after construction with arbitrary parameters.
    pub fn member<F>(
        &mut self,
        name: &'static str,
        kind: MemberKind,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
        inject: F,
    ) -> &mut Self
    where
        F: Fn(&T, &Arguments) -> DiResult<()> + Send + Sync + 'static,
    {
        let injector = Arc::new(move |any: &AnyArc, args: &Arguments| {
            let target = instance::downcast::<T>(any)?;
            inject(&target, args)
        });
        self.entry.members.push(MemberDescriptor {
            name,
            kind,
            parameters: parameters.into_iter().collect(),
            injector,
        });
        self
    }

    /// Declares a property setter receiving one `D`.
    pub fn property<D, F>(&mut self, name: &'static str, set: F) -> &mut Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<D>) + Send + Sync + 'static,
    {
        self.member(
            name,
            MemberKind::Property,
            [ParameterDescriptor::single::<D>(name)],
            move |target, args| {
                set(target, args.get::<D>(0)?);
                Ok(())
            },
        )
    }

    /// Declares a property that is left untouched when no `D` is bound.
    pub fn optional_property<D, F>(&mut self, name: &'static str, set: F) -> &mut Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<D>) + Send + Sync + 'static,
    {
        self.member(
            name,
            MemberKind::Property,
            [ParameterDescriptor::optional::<D>(name)],
            move |target, args| {
                if let Some(value) = args.optional::<D>(0)? {
                    set(target, value);
                }
                Ok(())
            },
        )
    }

    /// Declares a field slot receiving one `D`.
    pub fn field<D, F>(&mut self, name: &'static str, set: F) -> &mut Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<D>) + Send + Sync + 'static,
    {
        self.member(
            name,
            MemberKind::Field,
            [ParameterDescriptor::single::<D>(name)],
            move |target, args| {
                set(target, args.get::<D>(0)?);
                Ok(())
            },
        )
    }

    /// Declares an injection method.
    pub fn method<F>(
        &mut self,
        name: &'static str,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
        call: F,
    ) -> &mut Self
    where
        F: Fn(&T, &Arguments) -> DiResult<()> + Send + Sync + 'static,
    {
        self.member(name, MemberKind::Method, parameters, call)
    }

    pub fn on_initialize<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&T) -> DiResult<()> + Send + Sync + 'static,
    {
        self.entry.lifecycle.initializers.push(typed_hook(hook));
        self
    }

    pub fn on_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&T) -> DiResult<()> + Send + Sync + 'static,
    {
        self.entry.lifecycle.starters.push(typed_hook(hook));
        self
    }

    pub fn on_stop<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.entry.lifecycle.stoppers.push(typed_hook(move |t: &T| {
            hook(t);
            Ok(())
        }));
        self
    }

    pub fn on_dispose<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.entry.lifecycle.disposers.push(typed_hook(move |t: &T| {
            hook(t);
            Ok(())
        }));
        self
    }

    /// Runs [`Initialize::initialize`] on activation.
    pub fn initializable(&mut self) -> &mut Self
    where
        T: Initialize,
    {
        self.on_initialize(|t| t.initialize())
    }

    /// Runs [`Start::start`] on activation and [`Start::stop`] on deactivation.
    pub fn startable(&mut self) -> &mut Self
    where
        T: Start,
    {
        self.on_start(|t| t.start()).on_stop(|t| t.stop())
    }

    /// Runs [`Dispose::dispose`] when the instance is deactivated.
    pub fn disposable(&mut self) -> &mut Self
    where
        T: Dispose,
    {
        self.on_dispose(|t| t.dispose())
    }
}

impl<T: Send + Sync + 'static> Drop for TypeBuilder<'_, T> {
    fn drop(&mut self) {
        let entry = std::mem::take(&mut self.entry);
        self.registry
            .commit(self.key.clone(), TypeId::of::<Arc<T>>(), entry);
    }
}

fn typed_hook<T, F>(hook: F) -> super::LifecycleHook
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> DiResult<()> + Send + Sync + 'static,
{
    Arc::new(move |any: &AnyArc| {
        let target = instance::downcast::<T>(any)?;
        hook(&target)
    })
}
