//! Bindings: declarative mappings from a service type to a way of
//! producing instances.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::activation::{Context, Request};
use crate::error::DiResult;
use crate::instance::{self, AnyArc};
use crate::key::{Generic, TypeKey};
use crate::scope::{ScopeObject, ScopeSelector};

pub mod resolver;
pub mod store;

pub use resolver::BindingResolver;
pub use store::BindingStore;

/// Unique, monotonically increasing binding identity.
///
/// Registration order of bindings is the order of their ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BindingId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Predicate restricting when a binding applies.
pub type Condition = Arc<dyn Fn(&Request) -> bool + Send + Sync>;
/// Converts an implementation instance into the service view.
pub type Conversion = Arc<dyn Fn(&AnyArc) -> DiResult<AnyArc> + Send + Sync>;
/// Produces an instance for a factory binding.
pub type FactoryFn = Arc<dyn Fn(&Context) -> DiResult<AnyArc> + Send + Sync>;
/// Closes an open-generic binding over a requested closed service.
pub type GenericCloser = Arc<dyn Fn(&TypeKey) -> Option<ClosedGeneric> + Send + Sync>;
/// Per-binding action run against the service view of an instance.
pub type InstanceAction = Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>;

/// Result of closing an open-generic binding.
#[derive(Clone)]
pub struct ClosedGeneric {
    pub implementation: TypeKey,
    pub conversion: Option<Conversion>,
}

impl ClosedGeneric {
    /// Closes over implementation `I`, viewed as service `S`.
    ///
    /// ```rust
    /// use ferrous_kernel::ClosedGeneric;
    /// use std::sync::Arc;
    ///
    /// trait Repository<T>: Send + Sync {}
    /// struct MemoryRepository<T>(std::marker::PhantomData<T>);
    /// impl<T: Send + Sync> Repository<T> for MemoryRepository<T> {}
    ///
    /// let closed = ClosedGeneric::new::<dyn Repository<u32>, MemoryRepository<u32>>(|r| r as Arc<dyn Repository<u32>>);
    /// assert!(closed.implementation.name().contains("MemoryRepository<u32>"));
    /// ```
    pub fn new<S, I>(upcast: fn(Arc<I>) -> Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Send + Sync + 'static,
    {
        Self {
            implementation: TypeKey::of::<I>(),
            conversion: Some(upcast_conversion(upcast)),
        }
    }
}

/// What a binding produces instances from.
#[derive(Clone)]
pub enum BindingTarget {
    /// A concrete type, constructed through its plan
    Type(TypeKey),
    /// A user factory
    Factory(FactoryFn),
    /// A fixed, pre-built instance
    Constant(AnyArc),
    /// A family of implementations chosen from the requested type arguments
    OpenGeneric(GenericCloser),
}

impl BindingTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            BindingTarget::Type(_) => "type",
            BindingTarget::Factory(_) => "factory",
            BindingTarget::Constant(_) => "constant",
            BindingTarget::OpenGeneric(_) => "open-generic",
        }
    }
}

impl fmt::Debug for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Type(key) => f.debug_tuple("Type").field(key).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Name and free-form metadata attached to a binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingMetadata {
    pub name: Option<String>,
    pub entries: Vec<(String, String)>,
}

impl BindingMetadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// A registered mapping from a service type to a target.
pub struct Binding {
    id: BindingId,
    service: TypeKey,
    target: BindingTarget,
    conversion: Option<Conversion>,
    conditions: Vec<Condition>,
    scope: ScopeSelector,
    metadata: BindingMetadata,
    is_default: bool,
    is_implicit: bool,
    on_activation: Vec<InstanceAction>,
    on_deactivation: Vec<InstanceAction>,
}

impl Binding {
    /// Starts declaring a binding for service `S`.
    ///
    /// ```rust
    /// use ferrous_kernel::{Binding, TypeKey};
    ///
    /// struct Clock;
    ///
    /// let binding = Binding::bind::<Clock>().to_self().in_singleton_scope().build();
    /// assert_eq!(binding.service(), &TypeKey::of::<Clock>());
    /// assert!(!binding.is_conditional());
    /// ```
    pub fn bind<S: ?Sized + Send + Sync + 'static>() -> BindingBuilder<S> {
        BindingBuilder::new(TypeKey::of::<S>())
    }

    /// Starts declaring a binding for a closed generic service.
    pub fn bind_generic<S: Generic + ?Sized + Send + Sync>() -> BindingBuilder<S> {
        BindingBuilder::new(TypeKey::of_generic::<S>())
    }

    /// Declares an open-generic binding for `family` with `arity` type parameters.
    ///
    /// `closer` receives the requested closed service and returns the
    /// implementation to construct, or `None` when it does not apply.
    pub fn open_generic<F>(family: &'static str, arity: usize, closer: F) -> BindingBuilder<dyn std::any::Any + Send + Sync>
    where
        F: Fn(&TypeKey) -> Option<ClosedGeneric> + Send + Sync + 'static,
    {
        let mut builder = BindingBuilder::new(TypeKey::open(family, arity));
        builder.target = Some(BindingTarget::OpenGeneric(Arc::new(closer)));
        builder
    }

    /// Auto-generated transient self-binding.
    pub(crate) fn implicit(service: TypeKey) -> Self {
        Self {
            id: BindingId::next(),
            target: BindingTarget::Type(service.clone()),
            service,
            conversion: None,
            conditions: Vec::new(),
            scope: ScopeSelector::Transient,
            metadata: BindingMetadata::default(),
            is_default: false,
            is_implicit: true,
            on_activation: Vec::new(),
            on_deactivation: Vec::new(),
        }
    }

    /// Unregistered binding standing in for an instance created outside the kernel.
    pub(crate) fn external(service: TypeKey, instance: AnyArc) -> Self {
        let mut binding = Self::implicit(service);
        binding.target = BindingTarget::Constant(instance);
        binding
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn service(&self) -> &TypeKey {
        &self.service
    }

    pub fn target(&self) -> &BindingTarget {
        &self.target
    }

    pub fn conversion(&self) -> Option<&Conversion> {
        self.conversion.as_ref()
    }

    pub fn scope(&self) -> &ScopeSelector {
        &self.scope
    }

    pub fn metadata(&self) -> &BindingMetadata {
        &self.metadata
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn is_implicit(&self) -> bool {
        self.is_implicit
    }

    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub(crate) fn activation_actions(&self) -> &[InstanceAction] {
        &self.on_activation
    }

    pub(crate) fn deactivation_actions(&self) -> &[InstanceAction] {
        &self.on_deactivation
    }

    /// Whether this binding applies to `request`: every condition holds
    /// and, for open generics, the family closes over the requested type.
    pub fn matches(&self, request: &Request) -> bool {
        if let BindingTarget::OpenGeneric(closer) = &self.target {
            if closer(request.service()).is_none() {
                return false;
            }
        }
        self.conditions.iter().all(|condition| condition(request))
    }

    /// One-line description used in diagnostics.
    pub fn describe(&self) -> String {
        let target = match &self.target {
            BindingTarget::Type(key) => key.name().to_string(),
            other => other.kind().to_string(),
        };
        let mut out = format!("{} {} -> {} ({})", self.id, self.service.name(), target, self.scope.name());
        if let Some(name) = self.name() {
            out.push_str(&format!(" named \"{name}\""));
        }
        if self.is_conditional() {
            out.push_str(" [conditional]");
        }
        if self.is_default {
            out.push_str(" [default]");
        }
        if self.is_implicit {
            out.push_str(" [implicit]");
        }
        out
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("target", &self.target)
            .field("scope", &self.scope)
            .field("metadata", &self.metadata)
            .field("conditions", &self.conditions.len())
            .field("is_default", &self.is_default)
            .field("is_implicit", &self.is_implicit)
            .finish()
    }
}

/// Typed builder for a [`Binding`] of service `S`.
pub struct BindingBuilder<S: ?Sized> {
    service: TypeKey,
    target: Option<BindingTarget>,
    conversion: Option<Conversion>,
    conditions: Vec<Condition>,
    scope: Option<ScopeSelector>,
    metadata: BindingMetadata,
    is_default: bool,
    on_activation: Vec<InstanceAction>,
    on_deactivation: Vec<InstanceAction>,
    _marker: PhantomData<fn(&S)>,
}

impl<S: ?Sized + Send + Sync + 'static> BindingBuilder<S> {
    fn new(service: TypeKey) -> Self {
        Self {
            service,
            target: None,
            conversion: None,
            conditions: Vec::new(),
            scope: None,
            metadata: BindingMetadata::default(),
            is_default: false,
            on_activation: Vec::new(),
            on_deactivation: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Targets the service type itself.
    pub fn to_self(mut self) -> Self
    where
        S: Sized,
    {
        self.target = Some(BindingTarget::Type(self.service.clone()));
        self.conversion = None;
        self
    }

    /// Targets implementation `I`, viewed as `S` through `upcast`.
    pub fn to<I: Send + Sync + 'static>(mut self, upcast: fn(Arc<I>) -> Arc<S>) -> Self {
        self.target = Some(BindingTarget::Type(TypeKey::of::<I>()));
        self.conversion = Some(upcast_conversion(upcast));
        self
    }

    /// Targets a factory invoked with the activation context.
    pub fn to_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Context) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.target = Some(BindingTarget::Factory(Arc::new(move |ctx| factory(ctx).map(instance::erase))));
        self.conversion = None;
        self
    }

    /// Targets a fixed instance; implies singleton scope unless overridden.
    pub fn to_constant(mut self, value: Arc<S>) -> Self {
        self.target = Some(BindingTarget::Constant(instance::erase(value)));
        self.conversion = None;
        if self.scope.is_none() {
            self.scope = Some(ScopeSelector::Singleton);
        }
        self
    }

    /// Adds a condition; all conditions must hold for the binding to apply.
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Applies only when the direct consumer is implementation `P`.
    pub fn when_injected_into<P: ?Sized + 'static>(self) -> Self {
        let parent = TypeKey::of::<P>();
        self.when(move |request| {
            request
                .parent()
                .and_then(|ctx| ctx.implementation())
                .is_some_and(|implementation| *implementation == parent)
        })
    }

    /// Applies when any ancestor request targets implementation or service `A`.
    pub fn when_any_ancestor<A: ?Sized + 'static>(self) -> Self {
        let ancestor = TypeKey::of::<A>();
        self.when(move |request| request.has_ancestor(&ancestor))
    }

    /// Applies when the injection target (parameter or member) has this name.
    pub fn when_target_named(self, name: &'static str) -> Self {
        self.when(move |request| request.target().is_some_and(|target| target.name == name))
    }

    pub fn in_scope(mut self, scope: ScopeSelector) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn in_singleton_scope(self) -> Self {
        self.in_scope(ScopeSelector::Singleton)
    }

    pub fn in_transient_scope(self) -> Self {
        self.in_scope(ScopeSelector::Transient)
    }

    pub fn in_request_scope(self) -> Self {
        self.in_scope(ScopeSelector::Request)
    }

    pub fn in_block_scope(self) -> Self {
        self.in_scope(ScopeSelector::Block)
    }

    /// Caches instances against whatever object `select` returns.
    pub fn in_custom_scope<F>(self, select: F) -> Self
    where
        F: Fn(&Context) -> Option<ScopeObject> + Send + Sync + 'static,
    {
        self.in_scope(ScopeSelector::custom(select))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.entries.push((key.into(), value.into()));
        self
    }

    /// Marks this binding as the tie-breaker among equally applicable ones.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn on_activation<F>(mut self, action: F) -> Self
    where
        F: Fn(&S) -> DiResult<()> + Send + Sync + 'static,
    {
        self.on_activation.push(typed_action(action));
        self
    }

    pub fn on_deactivation<F>(mut self, action: F) -> Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.on_deactivation.push(typed_action(move |s: &S| {
            action(s);
            Ok(())
        }));
        self
    }

    /// Untyped activation action; used where `S` is not nameable (open generics).
    pub fn on_activation_any<F>(mut self, action: F) -> Self
    where
        F: Fn(&AnyArc) -> DiResult<()> + Send + Sync + 'static,
    {
        self.on_activation.push(Arc::new(action));
        self
    }

    /// Finishes the binding. Without an explicit target the service binds to itself.
    pub fn build(self) -> Binding {
        Binding {
            id: BindingId::next(),
            target: self
                .target
                .unwrap_or_else(|| BindingTarget::Type(self.service.clone())),
            service: self.service,
            conversion: self.conversion,
            conditions: self.conditions,
            scope: self.scope.unwrap_or_default(),
            metadata: self.metadata,
            is_default: self.is_default,
            is_implicit: false,
            on_activation: self.on_activation,
            on_deactivation: self.on_deactivation,
        }
    }
}

fn upcast_conversion<S, I>(upcast: fn(Arc<I>) -> Arc<S>) -> Conversion
where
    S: ?Sized + Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    Arc::new(move |any: &AnyArc| instance::downcast::<I>(any).map(|concrete| instance::erase(upcast(concrete))))
}

fn typed_action<S, F>(action: F) -> InstanceAction
where
    S: ?Sized + Send + Sync + 'static,
    F: Fn(&S) -> DiResult<()> + Send + Sync + 'static,
{
    Arc::new(move |any: &AnyArc| {
        let service = instance::downcast::<S>(any)?;
        action(&service)
    })
}
