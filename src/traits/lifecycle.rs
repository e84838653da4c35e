//! Lifecycle traits recognised by the activation pipeline.
//!
//! Implementing a trait is not enough on its own: the type's metadata must
//! opt in (`TypeBuilder::initializable`, `startable`, `disposable`) so the
//! hooks end up in its plan.

use crate::error::DiResult;

/// Post-construction initialization.
///
/// Runs after member injection, once per activation.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{Binding, DiResult, Initialize, Kernel, Resolver, TypeRegistry};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Cache { warmed: AtomicBool }
///
/// impl Initialize for Cache {
///     fn initialize(&self) -> DiResult<()> {
///         self.warmed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let registry = TypeRegistry::new();
/// registry.register::<Cache>().default_constructor(Cache::default).initializable();
///
/// let kernel = Kernel::new(Arc::new(registry));
/// let cache = kernel.get::<Cache>().unwrap();
/// assert!(cache.warmed.load(Ordering::SeqCst));
/// ```
pub trait Initialize: Send + Sync + 'static {
    fn initialize(&self) -> DiResult<()>;
}

/// Start/stop pair: started on activation, stopped on deactivation.
pub trait Start: Send + Sync + 'static {
    fn start(&self) -> DiResult<()>;

    fn stop(&self);
}

/// Synchronous resource teardown.
///
/// Implement this for services that need structured teardown (flushing
/// buffers, closing connections). The hook runs when the instance is
/// deactivated: its scope ends, it is released, or its scope is pruned.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{Binding, Dispose, Kernel, Resolver, TypeRegistry};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// static CLOSED: AtomicUsize = AtomicUsize::new(0);
///
/// struct Connection;
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         CLOSED.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let registry = TypeRegistry::new();
/// registry.register::<Connection>().default_constructor(|| Connection).disposable();
///
/// let kernel = Kernel::new(Arc::new(registry));
/// kernel.add_binding(Binding::bind::<Connection>().to_self().in_singleton_scope().build());
///
/// let _conn = kernel.get::<Connection>().unwrap();
/// kernel.dispose();
/// assert_eq!(CLOSED.load(Ordering::SeqCst), 1);
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}
