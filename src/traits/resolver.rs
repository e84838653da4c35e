//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::activation::Constraint;
use crate::error::DiResult;
use crate::instance::{self, AnyArc};
use crate::key::{Generic, TypeKey};

/// Object-safe resolution surface.
///
/// Implemented by [`Kernel`](crate::Kernel), [`ActivationBlock`](crate::ActivationBlock)
/// and [`Context`](crate::Context). The context implementation resolves
/// as a child of the request being activated, so conditions, cycle
/// detection and request/block scopes see the full chain.
///
/// Most callers use the typed [`Resolver`] extension instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves exactly one instance of `service`.
    ///
    /// Fails with `MissingBinding` when nothing matches and no implicit
    /// self-binding can be synthesized.
    fn resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<AnyArc>;

    /// Like [`resolve_any`](Self::resolve_any) but yields `None` instead of
    /// `MissingBinding`. Other failures still propagate.
    fn try_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Option<AnyArc>>;

    /// Resolves every matching binding, in registration order.
    ///
    /// An empty result is not an error.
    fn resolve_many(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Vec<AnyArc>>;

    /// Whether a single-instance request for `service` would find a binding.
    ///
    /// Does not construct anything and does not check transitive dependencies.
    fn can_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> bool;
}

/// Typed resolution helpers built on [`ResolverCore`].
///
/// Concrete types and trait objects go through the same methods.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{Binding, Kernel, Resolver, TypeRegistry};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {msg}")
///     }
/// }
///
/// let registry = TypeRegistry::new();
/// registry.register::<ConsoleLogger>().default_constructor(|| ConsoleLogger);
///
/// let kernel = Kernel::new(Arc::new(registry));
/// kernel.add_binding(
///     Binding::bind::<dyn Logger>()
///         .to::<ConsoleLogger>(|l| l as Arc<dyn Logger>)
///         .build(),
/// );
///
/// let logger = kernel.get::<dyn Logger>().unwrap();
/// assert_eq!(logger.log("ready"), "LOG: ready");
/// assert!(kernel.get_all::<dyn Logger>().unwrap().len() == 1);
/// ```
pub trait Resolver: ResolverCore {
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&TypeKey::of::<T>(), &Constraint::None)?;
        instance::downcast::<T>(&any)
    }

    /// Resolves the binding of `T` carrying `name`.
    fn get_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&TypeKey::of::<T>(), &Constraint::named(name))?;
        instance::downcast::<T>(&any)
    }

    /// Resolves a closed generic service, considering open-generic bindings.
    fn get_generic<T: Generic + ?Sized + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&TypeKey::of_generic::<T>(), &Constraint::None)?;
        instance::downcast::<T>(&any)
    }

    /// Optional resolution: `Ok(None)` when nothing is bound.
    fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_any(&TypeKey::of::<T>(), &Constraint::None)?
            .map(|any| instance::downcast::<T>(&any))
            .transpose()
    }

    /// Every binding of `T`, in registration order.
    fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&TypeKey::of::<T>(), &Constraint::None)?
            .iter()
            .map(instance::downcast::<T>)
            .collect()
    }

    fn can_resolve<T: ?Sized + 'static>(&self) -> bool {
        self.can_resolve_any(&TypeKey::of::<T>(), &Constraint::None)
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved (missing or ambiguous
    /// binding, circular dependency, failed activation).
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolves the named binding of `T`, panicking on failure.
    fn get_named_required<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Arc<T> {
        self.get_named::<T>(name)
            .unwrap_or_else(|e| panic!("Failed to resolve named {} ({}): {}", std::any::type_name::<T>(), name, e))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
