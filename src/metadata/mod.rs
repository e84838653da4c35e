//! Structural type descriptions consumed by the planner.
//!
//! The kernel never introspects types itself. A [`MetadataProvider`]
//! describes, for a [`TypeKey`], its constructors, its injectable members
//! and the lifecycle hooks it declares. [`TypeRegistry`] is the bundled
//! provider, filled through an explicit registration API.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::instance::{self, AnyArc};
use crate::key::{Generic, TypeKey};

pub mod registry;

pub use registry::{TypeBuilder, TypeRegistry};

/// Builds an implementation instance from resolved constructor arguments.
pub type Activator = Arc<dyn Fn(&Arguments) -> DiResult<AnyArc> + Send + Sync>;
/// Applies resolved arguments to an existing instance (property, field or method).
pub type MemberInjector = Arc<dyn Fn(&AnyArc, &Arguments) -> DiResult<()> + Send + Sync>;
/// Lifecycle callback run against an implementation instance.
pub type LifecycleHook = Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>;
/// Produces the default value of an optional parameter.
pub type DefaultValue = Arc<dyn Fn() -> AnyArc + Send + Sync>;

pub(crate) type Parameters = SmallVec<[ParameterDescriptor; 4]>;

/// How a parameter is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// Exactly one instance; missing bindings fail the resolution
    Single,
    /// One instance if available, otherwise the default (or nothing)
    Optional,
    /// Every matching binding, in registration order; may be empty
    Many,
}

/// A constructor or member parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub service: TypeKey,
    pub kind: ParameterKind,
    pub default: Option<DefaultValue>,
    /// Restricts candidate bindings to those carrying this name
    pub named: Option<&'static str>,
}

impl ParameterDescriptor {
    pub fn keyed(name: &'static str, service: TypeKey, kind: ParameterKind) -> Self {
        Self {
            name,
            service,
            kind,
            default: None,
            named: None,
        }
    }

    /// A required dependency on `T`.
    pub fn single<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::keyed(name, TypeKey::of::<T>(), ParameterKind::Single)
    }

    /// A dependency on `T` that may be absent.
    pub fn optional<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::keyed(name, TypeKey::of::<T>(), ParameterKind::Optional)
    }

    /// An unconstrained collection of every `T` binding.
    pub fn many<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::keyed(name, TypeKey::of::<T>(), ParameterKind::Many)
    }

    /// A required dependency on a closed generic service.
    pub fn generic<T: Generic + ?Sized>(name: &'static str) -> Self {
        Self::keyed(name, TypeKey::of_generic::<T>(), ParameterKind::Single)
    }

    /// Value used when no binding satisfies this parameter.
    pub fn with_default<T, F>(mut self, default: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(move || instance::erase(default())));
        self
    }

    pub fn named(mut self, binding_name: &'static str) -> Self {
        self.named = Some(binding_name);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Whether this parameter can be satisfied even when nothing is bound.
    pub fn tolerates_missing(&self) -> bool {
        matches!(self.kind, ParameterKind::Many | ParameterKind::Optional) || self.default.is_some()
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("kind", &self.kind)
            .field("has_default", &self.default.is_some())
            .field("named", &self.named)
            .finish()
    }
}

/// One way of constructing a type.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub parameters: SmallVec<[ParameterDescriptor; 4]>,
    pub activator: Activator,
}

impl ConstructorDescriptor {
    pub fn new(parameters: impl IntoIterator<Item = ParameterDescriptor>, activator: Activator) -> Self {
        Self {
            parameters: parameters.into_iter().collect(),
            activator,
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Field,
    Method,
}

/// A member marked for injection after construction.
#[derive(Clone)]
pub struct MemberDescriptor {
    pub name: &'static str,
    pub kind: MemberKind,
    pub parameters: SmallVec<[ParameterDescriptor; 4]>,
    pub injector: MemberInjector,
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Lifecycle callbacks a type declares.
#[derive(Clone, Default)]
pub struct LifecycleDescriptor {
    pub initializers: Vec<LifecycleHook>,
    pub starters: Vec<LifecycleHook>,
    pub stoppers: Vec<LifecycleHook>,
    pub disposers: Vec<LifecycleHook>,
}

impl LifecycleDescriptor {
    pub fn is_empty(&self) -> bool {
        self.initializers.is_empty()
            && self.starters.is_empty()
            && self.stoppers.is_empty()
            && self.disposers.is_empty()
    }
}

impl fmt::Debug for LifecycleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleDescriptor")
            .field("initializers", &self.initializers.len())
            .field("starters", &self.starters.len())
            .field("stoppers", &self.stoppers.len())
            .field("disposers", &self.disposers.len())
            .finish()
    }
}

/// Source of structural type descriptions.
///
/// Implementations may be backed by code generation, an explicit
/// registration API ([`TypeRegistry`]) or any other introspection facility.
pub trait MetadataProvider: Send + Sync {
    fn describe_constructors(&self, ty: &TypeKey) -> Vec<ConstructorDescriptor>;

    fn describe_injectable_members(&self, ty: &TypeKey) -> Vec<MemberDescriptor>;

    fn describe_lifecycle(&self, _ty: &TypeKey) -> LifecycleDescriptor {
        LifecycleDescriptor::default()
    }

    /// Whether `ty` may be bound to itself implicitly.
    fn is_self_bindable(&self, ty: &TypeKey) -> bool {
        !self.describe_constructors(ty).is_empty()
    }

    /// Maps the payload `TypeId` of an instance (`TypeId::of::<Arc<T>>()`)
    /// back to the key of `T`, enabling injection into instances the
    /// planner did not construct.
    fn key_for_payload(&self, _payload: TypeId) -> Option<TypeKey> {
        None
    }
}

/// A resolved argument slot.
#[derive(Clone)]
pub enum Argument {
    Single(AnyArc),
    Many(Vec<AnyArc>),
    Missing,
}

/// Resolved arguments for a constructor or member, in parameter order.
#[derive(Clone, Default)]
pub struct Arguments {
    values: SmallVec<[Argument; 4]>,
}

impl Arguments {
    pub fn new(values: impl IntoIterator<Item = Argument>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&Argument> {
        self.values.get(index)
    }

    /// The single instance at `index`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        match self.values.get(index) {
            Some(Argument::Single(any)) => instance::downcast::<T>(any),
            _ => Err(DiError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// The optional instance at `index`; `None` when it could not be resolved.
    pub fn optional<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Option<Arc<T>>> {
        match self.values.get(index) {
            Some(Argument::Single(any)) => instance::downcast::<T>(any).map(Some),
            Some(Argument::Missing) => Ok(None),
            _ => Err(DiError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// The collection at `index`, in binding registration order.
    pub fn all<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Vec<Arc<T>>> {
        match self.values.get(index) {
            Some(Argument::Many(items)) => items.iter().map(instance::downcast::<T>).collect(),
            _ => Err(DiError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            }),
        }
    }
}
