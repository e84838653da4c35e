//! Activation contexts.

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use super::request::{Constraint, Request, RequestMode};
use crate::binding::{Binding, BindingId, BindingTarget, Conversion};
use crate::error::{DiError, DiResult};
use crate::instance::AnyArc;
use crate::kernel::{Kernel, KernelInner};
use crate::key::TypeKey;
use crate::metadata::{Argument, ParameterDescriptor};
use crate::planning::Plan;
use crate::traits::ResolverCore;

/// What "under construction" means for cycle detection: the concrete
/// type for planned activations, the binding for factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationIdentity {
    Type(TypeId),
    Binding(BindingId),
}

/// A created instance: the implementation object and the service view
/// handed to callers. Both are the same object unless the binding converts.
#[derive(Clone)]
pub struct InstanceReference {
    pub instance: AnyArc,
    pub service: AnyArc,
    /// Plan of the instance's concrete type, when one is known
    pub plan: Option<Arc<Plan>>,
}

impl InstanceReference {
    /// Whether `any` is this instance (either view).
    pub fn is(&self, any: &AnyArc) -> bool {
        let addr = |a: &AnyArc| Arc::as_ptr(a) as *const () as usize;
        addr(any) == addr(&self.instance) || addr(any) == addr(&self.service)
    }
}

impl fmt::Debug for InstanceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceReference")
            .field("plan", &self.plan.as_ref().map(|p| p.implementation()))
            .finish_non_exhaustive()
    }
}

/// A request paired with its selected binding.
///
/// Passed to factories, scope callbacks and activation strategies. The
/// instance reference is set exactly once, right after construction.
/// A context is also a [`ResolverCore`]: resolving through it creates
/// child requests, so factories participate in cycle detection and see
/// the same request and block scopes as the activation they belong to.
pub struct Context {
    request: Request,
    binding: Arc<Binding>,
    implementation: Option<TypeKey>,
    plan: Option<Arc<Plan>>,
    conversion: Option<Conversion>,
    identity: Option<ActivationIdentity>,
    kernel: Weak<KernelInner>,
    this: Weak<Context>,
    instance: OnceCell<InstanceReference>,
}

impl Context {
    pub(crate) fn new(
        request: Request,
        binding: Arc<Binding>,
        implementation: Option<TypeKey>,
        plan: Option<Arc<Plan>>,
        conversion: Option<Conversion>,
        kernel: Weak<KernelInner>,
    ) -> Arc<Self> {
        let identity = match (&implementation, binding.target()) {
            (Some(implementation), _) => Some(ActivationIdentity::Type(implementation.id())),
            (None, BindingTarget::Factory(_)) => Some(ActivationIdentity::Binding(binding.id())),
            _ => None,
        };
        Arc::new_cyclic(|this| Self {
            request,
            binding,
            implementation,
            plan,
            conversion,
            identity,
            kernel,
            this: this.clone(),
            instance: OnceCell::new(),
        })
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    /// Concrete type being constructed; `None` for factory and constant bindings.
    pub fn implementation(&self) -> Option<&TypeKey> {
        self.implementation.as_ref()
    }

    pub fn plan(&self) -> Option<&Arc<Plan>> {
        self.plan.as_ref()
    }

    pub fn identity(&self) -> Option<ActivationIdentity> {
        self.identity
    }

    pub(crate) fn conversion(&self) -> Option<&Conversion> {
        self.conversion.as_ref()
    }

    /// The created instance, once construction has finished.
    pub fn instance(&self) -> Option<&InstanceReference> {
        self.instance.get()
    }

    pub(crate) fn set_instance(&self, reference: InstanceReference) {
        // Each context is constructed at most once.
        let _ = self.instance.set(reference);
    }

    /// Name of the implementation, or of the service for factories/constants.
    pub fn display_name(&self) -> &'static str {
        self.implementation
            .as_ref()
            .map_or(self.request.service().name(), TypeKey::name)
    }

    /// The owning kernel, unless it has been dropped.
    pub fn kernel(&self) -> Option<Kernel> {
        self.kernel.upgrade().map(Kernel::from_inner)
    }

    fn live(&self) -> DiResult<(Arc<KernelInner>, Arc<Context>)> {
        let detached = || DiError::WrongScope {
            service: self.request.service().name(),
            reason: "the kernel owning this context has been dropped",
        };
        let kernel = self.kernel.upgrade().ok_or_else(detached)?;
        let this = self.this.upgrade().ok_or_else(detached)?;
        Ok((kernel, this))
    }

    /// Fails with `CircularDependency` when an ancestor is already
    /// constructing the same type (or running the same factory).
    pub(crate) fn detect_cycle(&self) -> DiResult<()> {
        let Some(identity) = self.identity else {
            return Ok(());
        };
        if self
            .request
            .ancestors()
            .any(|ancestor| ancestor.identity == Some(identity))
        {
            return Err(DiError::CircularDependency {
                chain: self.request.chain(),
            });
        }
        Ok(())
    }

    /// Resolves one constructor or member parameter as a child request.
    pub fn resolve_parameter(&self, parameter: &ParameterDescriptor, member: Option<&'static str>) -> DiResult<Argument> {
        let (kernel, this) = self.live()?;
        kernel.resolve_parameter(&this, parameter, member)
    }

    /// Runs the plan's member injection against `reference`.
    pub fn inject_members(&self, reference: &InstanceReference) -> DiResult<()> {
        let Some(plan) = &reference.plan else {
            return Ok(());
        };
        if plan.members().is_empty() {
            return Ok(());
        }
        let (kernel, this) = self.live()?;
        kernel.inject_members(&this, plan, &reference.instance)
    }

    fn child_request(self: &Arc<Self>, service: &TypeKey, constraint: &Constraint, mode: RequestMode) -> Request {
        Request::child(self, service.clone(), constraint.clone(), mode, None)
    }
}

impl ResolverCore for Context {
    fn resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<AnyArc> {
        let (kernel, this) = self.live()?;
        let request = this.child_request(service, constraint, RequestMode::Single);
        kernel.resolve_single(request)?.ok_or(DiError::MissingBinding {
            service: service.name(),
            chain: this.request.chain(),
        })
    }

    fn try_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Option<AnyArc>> {
        let (kernel, this) = self.live()?;
        kernel.resolve_single(this.child_request(service, constraint, RequestMode::Optional))
    }

    fn resolve_many(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Vec<AnyArc>> {
        let (kernel, this) = self.live()?;
        kernel.resolve_many(this.child_request(service, constraint, RequestMode::Many))
    }

    fn can_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> bool {
        match self.live() {
            Ok((kernel, this)) => kernel.can_resolve(&this.child_request(service, constraint, RequestMode::Single)),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("binding", &self.binding.id())
            .field("implementation", &self.implementation)
            .field("activated", &self.instance.get().is_some())
            .finish()
    }
}
