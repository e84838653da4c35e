//! Activation blocks: child resolution roots with their own scope.

use crate::activation::{Constraint, RequestMode};
use crate::error::{DiError, DiResult};
use crate::instance::AnyArc;
use crate::key::TypeKey;
use crate::scope::{ScopeObject, ScopeToken};
use crate::traits::ResolverCore;

use super::{Kernel, KernelInner};

/// A resolution root that owns a block scope.
///
/// Everything resolved through the block sees the same block scope, so
/// bindings declared `in_block_scope` yield one instance per block. Ending
/// the block (explicitly or by dropping it) deactivates those instances,
/// newest first.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{Binding, Kernel, Resolver, TypeRegistry};
/// use std::sync::Arc;
///
/// struct UnitOfWork;
///
/// let registry = TypeRegistry::new();
/// registry.register::<UnitOfWork>().default_constructor(|| UnitOfWork);
/// let kernel = Kernel::new(Arc::new(registry));
/// kernel.add_binding(Binding::bind::<UnitOfWork>().in_block_scope().build());
///
/// let block = kernel.begin_block();
/// let a = block.get::<UnitOfWork>().unwrap();
/// let b = block.get::<UnitOfWork>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let other = kernel.begin_block();
/// assert!(!Arc::ptr_eq(&a, &other.get::<UnitOfWork>().unwrap()));
///
/// assert_eq!(block.end(), 1);
/// // Outside any block the binding cannot be used.
/// assert!(kernel.get::<UnitOfWork>().is_err());
/// ```
pub struct ActivationBlock {
    kernel: Kernel,
    scope: ScopeObject,
    ended: bool,
}

impl ActivationBlock {
    pub(crate) fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            scope: ScopeToken::new_scope("block"),
            ended: false,
        }
    }

    /// The scope object block-scoped instances are cached against.
    pub fn scope(&self) -> &ScopeObject {
        &self.scope
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Ends the block and returns the number of instances deactivated.
    pub fn end(mut self) -> usize {
        self.finish()
    }

    fn finish(&mut self) -> usize {
        if self.ended {
            return 0;
        }
        self.ended = true;
        self.kernel.inner.end_scope(&self.scope)
    }
}

impl ResolverCore for ActivationBlock {
    fn resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<AnyArc> {
        self.kernel
            .inner
            .root(service, constraint, RequestMode::Single, Some(&self.scope), KernelInner::resolve_single)?
            .ok_or_else(|| DiError::MissingBinding {
                service: service.name(),
                chain: vec![service.name()],
            })
    }

    fn try_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Option<AnyArc>> {
        self.kernel
            .inner
            .root(service, constraint, RequestMode::Optional, Some(&self.scope), KernelInner::resolve_single)
    }

    fn resolve_many(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Vec<AnyArc>> {
        self.kernel
            .inner
            .root(service, constraint, RequestMode::Many, Some(&self.scope), KernelInner::resolve_many)
    }

    fn can_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> bool {
        self.kernel.inner.can_resolve_root(service, constraint, Some(&self.scope))
    }
}

impl Drop for ActivationBlock {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for ActivationBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationBlock").field("ended", &self.ended).finish()
    }
}
