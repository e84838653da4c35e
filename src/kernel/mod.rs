//! The kernel: binding root, resolution entry points and lifecycle control.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::activation::{ActivationStrategy, Constraint, Context, InstanceReference, Pipeline, Request, RequestMode, Target};
use crate::binding::{Binding, BindingId, BindingResolver, BindingStore, BindingTarget};
use crate::descriptors::BindingDescriptor;
use crate::error::{DiError, DiResult};
use crate::instance::{self, AnyArc};
use crate::key::TypeKey;
use crate::metadata::{Argument, Arguments, ConstructorDescriptor, MetadataProvider, ParameterDescriptor, ParameterKind};
use crate::planning::{self, Plan, Planner};
use crate::scope::cache::{CacheEntry, Lookup};
use crate::scope::{Cache, ScopeObject, ScopeToken};
use crate::settings::KernelSettings;
use crate::traits::ResolverCore;

pub mod block;

pub use block::ActivationBlock;

/// Resolution kernel.
///
/// The `Kernel` owns the binding store, the plan cache, the scope cache and
/// the activation pipeline. It is cheap to clone (all clones share the same
/// state) and safe to use from many threads at once.
///
/// # Thread Safety
///
/// Bindings and plans live behind reader-writer locks. Each scope's cache
/// table has its own lock, and no lock is held while user code (activators,
/// factories, hooks) runs. Each resolution call builds its own request tree.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{Binding, Kernel, ParameterDescriptor, Resolver, TypeRegistry};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let registry = TypeRegistry::new();
/// registry.register::<Database>()
///     .default_constructor(|| Database { url: "postgres://localhost".to_string() });
/// registry.register::<UserService>()
///     .constructor([ParameterDescriptor::single::<Database>("db")], |args| {
///         Ok(UserService { db: args.get::<Database>(0)? })
///     });
///
/// let kernel = Kernel::new(Arc::new(registry));
/// kernel.add_binding(Binding::bind::<Database>().to_self().in_singleton_scope().build());
///
/// // UserService has no binding: an implicit transient self-binding is used.
/// let a = kernel.get::<UserService>().unwrap();
/// let b = kernel.get::<UserService>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.db, &b.db));
/// assert_eq!(a.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

pub(crate) struct KernelInner {
    settings: KernelSettings,
    provider: Arc<dyn MetadataProvider>,
    bindings: Arc<BindingStore>,
    resolver: BindingResolver,
    planner: Planner,
    cache: Cache,
    pipeline: Pipeline,
    root_scope: ScopeObject,
}

/// Builder for a [`Kernel`] with custom settings or pipeline.
pub struct KernelBuilder {
    provider: Arc<dyn MetadataProvider>,
    settings: KernelSettings,
    pipeline: Pipeline,
}

impl KernelBuilder {
    pub fn settings(mut self, settings: KernelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Appends a strategy after the standard ones.
    pub fn strategy(mut self, strategy: Arc<dyn ActivationStrategy>) -> Self {
        self.pipeline.push(strategy);
        self
    }

    /// Replaces the whole pipeline.
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn build(self) -> Kernel {
        let bindings = Arc::new(BindingStore::new());
        let resolver = BindingResolver::new(
            bindings.clone(),
            self.provider.clone(),
            self.settings.allow_implicit_bindings,
        );
        Kernel {
            inner: Arc::new(KernelInner {
                planner: Planner::new(self.provider.clone()),
                provider: self.provider,
                settings: self.settings,
                bindings,
                resolver,
                cache: Cache::new(),
                pipeline: self.pipeline,
                root_scope: ScopeToken::new_scope("kernel"),
            }),
        }
    }
}

impl Kernel {
    /// Kernel with default settings and the standard pipeline.
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self::builder(provider).build()
    }

    pub fn with_settings(provider: Arc<dyn MetadataProvider>, settings: KernelSettings) -> Self {
        Self::builder(provider).settings(settings).build()
    }

    pub fn builder(provider: Arc<dyn MetadataProvider>) -> KernelBuilder {
        KernelBuilder {
            provider,
            settings: KernelSettings::default(),
            pipeline: Pipeline::standard(),
        }
    }

    pub(crate) fn from_inner(inner: Arc<KernelInner>) -> Self {
        Self { inner }
    }

    pub fn settings(&self) -> &KernelSettings {
        &self.inner.settings
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.inner.provider
    }

    /// The scope object singleton bindings are cached against.
    pub fn root_scope(&self) -> &ScopeObject {
        &self.inner.root_scope
    }

    // Binding root

    pub fn add_binding(&self, binding: Binding) -> BindingId {
        self.inner.bindings.add(Arc::new(binding))
    }

    /// Removes a binding. Instances it already produced stay cached.
    pub fn remove_binding(&self, id: BindingId) -> bool {
        self.inner.bindings.remove(id)
    }

    /// Removes every binding of `S`; returns how many were removed.
    pub fn unbind<S: ?Sized + 'static>(&self) -> usize {
        self.inner.bindings.unbind(&TypeKey::of::<S>())
    }

    pub fn unbind_key(&self, service: &TypeKey) -> usize {
        self.inner.bindings.unbind(service)
    }

    /// Replaces every binding of the binding's service with `binding`.
    pub fn rebind(&self, binding: Binding) -> BindingId {
        self.inner.bindings.rebind(Arc::new(binding))
    }

    pub fn bindings_for<S: ?Sized + 'static>(&self) -> Vec<Arc<Binding>> {
        self.inner.bindings.bindings_for(&TypeKey::of::<S>())
    }

    pub fn bindings(&self) -> Vec<Arc<Binding>> {
        self.inner.bindings.all()
    }

    pub fn binding_descriptors(&self) -> Vec<BindingDescriptor> {
        self.inner
            .bindings
            .all()
            .iter()
            .map(|b| BindingDescriptor::from(b.as_ref()))
            .collect()
    }

    // Resolution

    /// Resolves one instance of `service` (type-erased).
    pub fn resolve(&self, service: &TypeKey, constraint: Constraint) -> DiResult<AnyArc> {
        self.resolve_any(service, &constraint)
    }

    /// Resolves every matching binding of `service`, in registration order.
    pub fn resolve_all(&self, service: &TypeKey, constraint: Constraint) -> DiResult<Vec<AnyArc>> {
        self.resolve_many(service, &constraint)
    }

    /// The (memoized) plan of a concrete type.
    pub fn plan_for(&self, implementation: &TypeKey) -> Arc<Plan> {
        self.inner.planner.get_plan(implementation)
    }

    // Lifecycle

    /// Opens a child resolution root with its own block scope.
    pub fn begin_block(&self) -> ActivationBlock {
        ActivationBlock::new(self.clone())
    }

    /// Deactivates and evicts every instance cached under `scope`.
    /// Returns the number of instances deactivated.
    pub fn end_scope(&self, scope: &ScopeObject) -> usize {
        self.inner.end_scope(scope)
    }

    /// Deactivates and evicts one cached instance.
    pub fn release(&self, instance: &AnyArc) -> bool {
        let entries = self.inner.cache.release(|entry| entry.reference.is(instance));
        self.inner.deactivate_entries(entries) > 0
    }

    /// Typed form of [`release`](Self::release).
    pub fn release_instance<T: ?Sized + Send + Sync + 'static>(&self, value: &Arc<T>) -> bool {
        let entries = self.inner.cache.release(|entry| {
            instance::is_same(&entry.reference.service, value) || instance::is_same(&entry.reference.instance, value)
        });
        self.inner.deactivate_entries(entries) > 0
    }

    /// Runs the activation pipeline (member injection, lifecycle hooks)
    /// against an instance created outside the kernel.
    ///
    /// Instances of types the metadata provider does not know are left
    /// untouched. The instance is not cached.
    pub fn inject(&self, value: &AnyArc) -> DiResult<()> {
        self.inner.inject(value)
    }

    /// Typed form of [`inject`](Self::inject).
    pub fn inject_into<T: Send + Sync + 'static>(&self, value: &Arc<T>) -> DiResult<()> {
        self.inject(&instance::erase(value.clone()))
    }

    /// Deactivates instances cached under scope objects that no longer
    /// exist. Returns the number of instances deactivated.
    pub fn prune(&self) -> usize {
        self.inner.prune()
    }

    /// Ends the kernel's singleton scope.
    pub fn dispose(&self) -> usize {
        self.inner.end_scope(&self.inner.root_scope)
    }

    /// Number of instances currently cached across all scopes.
    pub fn cached_instances(&self) -> usize {
        self.inner.cache.len()
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Kernel Debug ===\n");
        s.push_str("Bindings:\n");
        for binding in self.inner.bindings.all() {
            s.push_str(&format!("  {}\n", binding.describe()));
        }
        s.push_str(&format!("Plans: {}\n", self.inner.planner.len()));
        s.push_str(&format!("Cached instances: {}\n", self.inner.cache.len()));
        s.push_str(&format!("Pipeline: {:?}\n", self.inner.pipeline));
        s
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("settings", &self.inner.settings)
            .field("bindings", &self.inner.bindings.len())
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}

impl ResolverCore for Kernel {
    fn resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<AnyArc> {
        self.inner
            .root(service, constraint, RequestMode::Single, None, KernelInner::resolve_single)?
            .ok_or_else(|| DiError::MissingBinding {
                service: service.name(),
                chain: vec![service.name()],
            })
    }

    fn try_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Option<AnyArc>> {
        self.inner
            .root(service, constraint, RequestMode::Optional, None, KernelInner::resolve_single)
    }

    fn resolve_many(&self, service: &TypeKey, constraint: &Constraint) -> DiResult<Vec<AnyArc>> {
        self.inner
            .root(service, constraint, RequestMode::Many, None, KernelInner::resolve_many)
    }

    fn can_resolve_any(&self, service: &TypeKey, constraint: &Constraint) -> bool {
        self.inner.can_resolve_root(service, constraint, None)
    }
}

impl KernelInner {
    /// Runs one root resolution call.
    ///
    /// The call gets a fresh request scope. A failed call ends it at once.
    /// After a successful call the scope token is dropped, so its instances
    /// reach the caller live and are deactivated by the next prune.
    pub(crate) fn root<T, F>(
        self: &Arc<Self>,
        service: &TypeKey,
        constraint: &Constraint,
        mode: RequestMode,
        block: Option<&ScopeObject>,
        resolve: F,
    ) -> DiResult<T>
    where
        F: FnOnce(&Arc<Self>, Request) -> DiResult<T>,
    {
        if self.settings.prune_on_resolve {
            self.prune();
        }
        trace!(service = service.name(), ?mode, "resolving");
        let token = ScopeToken::new_scope("request");
        let request = Request::root(service.clone(), constraint.clone(), mode, &token, block);
        let result = resolve(self, request);
        if result.is_err() {
            self.end_scope(&token);
        }
        result
    }

    pub(crate) fn can_resolve_root(&self, service: &TypeKey, constraint: &Constraint, block: Option<&ScopeObject>) -> bool {
        let token = ScopeToken::new_scope("request");
        let request = Request::root(service.clone(), constraint.clone(), RequestMode::Single, &token, block);
        self.resolver.can_resolve(&request)
    }

    fn check_depth(&self, request: &Request) -> DiResult<()> {
        if request.depth() > self.settings.max_depth {
            return Err(DiError::DepthExceeded {
                depth: self.settings.max_depth,
                chain: request.chain(),
            });
        }
        Ok(())
    }

    /// Single or optional resolution of `request`.
    pub(crate) fn resolve_single(self: &Arc<Self>, request: Request) -> DiResult<Option<AnyArc>> {
        self.check_depth(&request)?;
        match self.resolver.resolve_single(&request)? {
            Some(binding) => self.activate(request, binding).map(Some),
            None => Ok(None),
        }
    }

    /// Multi-injection: every matching binding, in registration order.
    pub(crate) fn resolve_many(self: &Arc<Self>, request: Request) -> DiResult<Vec<AnyArc>> {
        self.check_depth(&request)?;
        self.resolver
            .resolve_all(&request)
            .into_iter()
            .map(|binding| self.activate(request.clone(), binding))
            .collect()
    }

    pub(crate) fn can_resolve(&self, request: &Request) -> bool {
        self.resolver.can_resolve(request)
    }

    /// Produces the instance for `binding`, going through its scope's cache.
    fn activate(self: &Arc<Self>, request: Request, binding: Arc<Binding>) -> DiResult<AnyArc> {
        let (implementation, conversion) = match binding.target() {
            BindingTarget::Type(implementation) => (Some(implementation.clone()), binding.conversion().cloned()),
            BindingTarget::OpenGeneric(closer) => {
                let closed = closer(request.service()).ok_or_else(|| DiError::MissingBinding {
                    service: request.service().name(),
                    chain: request.chain(),
                })?;
                (Some(closed.implementation), closed.conversion)
            }
            BindingTarget::Factory(_) | BindingTarget::Constant(_) => (None, binding.conversion().cloned()),
        };
        let plan = implementation.as_ref().map(|ty| self.planner.get_plan(ty));
        let ctx = Context::new(request, binding.clone(), implementation, plan, conversion, Arc::downgrade(self));

        let Some(scope) = binding.scope().select(&ctx, &self.root_scope)? else {
            let reference = self.construct(&ctx)?;
            self.pipeline.activate(&ctx, &reference)?;
            return Ok(reference.service);
        };

        let service = ctx.request().service();
        let lookup = self.cache.get_or_create(&scope, binding.id(), service, || {
            self.construct(&ctx).map(|reference| (ctx.clone(), reference))
        })?;
        match lookup {
            Lookup::Hit(reference) => Ok(reference.service),
            // Published before activation, so requests issued while
            // activating (member injection, hooks) resolve to this instance.
            Lookup::Created(reference) => {
                if let Err(err) = self.pipeline.activate(&ctx, &reference) {
                    self.cache.retract(&scope, binding.id(), service, &reference);
                    return Err(err);
                }
                Ok(reference.service)
            }
            Lookup::Raced { winner, .. } => Ok(winner.service),
            Lookup::Uncached(_) => Err(DiError::WrongScope {
                service: service.name(),
                reason: "the scope ended while the instance was being created",
            }),
        }
    }

    /// Builds the instance for `ctx` without activating it.
    fn construct(self: &Arc<Self>, ctx: &Arc<Context>) -> DiResult<InstanceReference> {
        ctx.detect_cycle()?;

        let (value, plan) = match (ctx.binding().target(), ctx.plan()) {
            (BindingTarget::Factory(factory), _) => {
                let value = factory(ctx)?;
                let plan = self.discover_plan(&value);
                (value, plan)
            }
            (BindingTarget::Constant(value), _) => (value.clone(), self.discover_plan(value)),
            (_, Some(plan)) => {
                let constructor = self.select_constructor(ctx, plan)?;
                let arguments = self.resolve_arguments(ctx, &constructor.parameters, None)?;
                ((constructor.activator)(&arguments)?, Some(plan.clone()))
            }
            (_, None) => {
                return Err(DiError::UnresolvablePlan {
                    implementation: ctx.display_name(),
                    chain: ctx.request().chain(),
                    missing: Vec::new(),
                })
            }
        };

        let service = match ctx.conversion() {
            Some(convert) => convert(&value)?,
            None => value.clone(),
        };
        let reference = InstanceReference {
            instance: value,
            service,
            plan,
        };
        ctx.set_instance(reference.clone());
        Ok(reference)
    }

    /// Plan for an instance the planner did not construct, if its type is known.
    fn discover_plan(&self, value: &AnyArc) -> Option<Arc<Plan>> {
        if !self.settings.inject_factory_instances {
            return None;
        }
        self.provider
            .key_for_payload(instance::payload_type_id(value))
            .map(|key| self.planner.get_plan(&key))
    }

    fn select_constructor<'p>(&self, ctx: &Arc<Context>, plan: &'p Plan) -> DiResult<&'p ConstructorDescriptor> {
        let constructor = planning::select_constructor(plan, |parameter| {
            parameter.tolerates_missing()
                || self
                    .resolver
                    .can_resolve(&self.parameter_request(ctx, parameter, None, RequestMode::Single))
        })
        .map_err(|missing| DiError::UnresolvablePlan {
            implementation: plan.implementation().name(),
            chain: ctx.request().chain(),
            missing,
        })?;
        trace!(
            implementation = plan.implementation().name(),
            arity = constructor.arity(),
            "selected constructor"
        );
        Ok(constructor)
    }

    fn parameter_request(
        &self,
        ctx: &Arc<Context>,
        parameter: &ParameterDescriptor,
        member: Option<&'static str>,
        mode: RequestMode,
    ) -> Request {
        let constraint = parameter.named.map(Constraint::named).unwrap_or_default();
        let target = Target {
            owner: ctx
                .implementation()
                .unwrap_or_else(|| ctx.request().service())
                .clone(),
            name: parameter.name,
            member,
        };
        Request::child(ctx, parameter.service.clone(), constraint, mode, Some(target))
    }

    /// Resolves parameters left to right.
    fn resolve_arguments(
        self: &Arc<Self>,
        ctx: &Arc<Context>,
        parameters: &[ParameterDescriptor],
        member: Option<&'static str>,
    ) -> DiResult<Arguments> {
        let values = parameters
            .iter()
            .map(|parameter| self.resolve_parameter(ctx, parameter, member))
            .collect::<DiResult<SmallVec<[Argument; 4]>>>()?;
        Ok(Arguments::new(values))
    }

    pub(crate) fn resolve_parameter(
        self: &Arc<Self>,
        ctx: &Arc<Context>,
        parameter: &ParameterDescriptor,
        member: Option<&'static str>,
    ) -> DiResult<Argument> {
        if parameter.kind == ParameterKind::Many {
            let request = self.parameter_request(ctx, parameter, member, RequestMode::Many);
            return self.resolve_many(request).map(Argument::Many);
        }

        let mode = if parameter.tolerates_missing() {
            RequestMode::Optional
        } else {
            RequestMode::Single
        };
        let request = self.parameter_request(ctx, parameter, member, mode);
        Ok(match self.resolve_single(request)? {
            Some(value) => Argument::Single(value),
            None => match &parameter.default {
                Some(default) => Argument::Single(default()),
                None => Argument::Missing,
            },
        })
    }

    /// Member injection, in declaration order.
    pub(crate) fn inject_members(self: &Arc<Self>, ctx: &Arc<Context>, plan: &Plan, value: &AnyArc) -> DiResult<()> {
        for member in plan.members() {
            let arguments = self.resolve_arguments(ctx, &member.parameters, Some(member.name))?;
            (member.injector)(value, &arguments)?;
            trace!(implementation = plan.implementation().name(), member = member.name, "injected member");
        }
        Ok(())
    }

    fn inject(self: &Arc<Self>, value: &AnyArc) -> DiResult<()> {
        let Some(service) = self.provider.key_for_payload(instance::payload_type_id(value)) else {
            return Ok(());
        };
        let plan = self.planner.get_plan(&service);
        let binding = Arc::new(Binding::external(service.clone(), value.clone()));
        let token = ScopeToken::new_scope("request");
        let request = Request::root(service, Constraint::None, RequestMode::Single, &token, None);
        let ctx = Context::new(request, binding, None, Some(plan.clone()), None, Arc::downgrade(self));
        let reference = InstanceReference {
            instance: value.clone(),
            service: value.clone(),
            plan: Some(plan),
        };
        ctx.set_instance(reference.clone());
        let result = self.pipeline.activate(&ctx, &reference);
        self.end_scope(&token);
        result
    }

    pub(crate) fn end_scope(&self, scope: &ScopeObject) -> usize {
        let entries = self.cache.end_scope(scope);
        if !entries.is_empty() {
            debug!(instances = entries.len(), "ending scope");
        }
        self.deactivate_entries(entries)
    }

    fn prune(&self) -> usize {
        let entries = self.cache.prune();
        if !entries.is_empty() {
            debug!(instances = entries.len(), "pruning dead scopes");
        }
        self.deactivate_entries(entries)
    }

    fn deactivate_entries(&self, entries: Vec<CacheEntry>) -> usize {
        let count = entries.len();
        for entry in entries {
            self.pipeline.deactivate(&entry.context, &entry.reference);
        }
        count
    }
}

impl Drop for KernelInner {
    fn drop(&mut self) {
        let entries = self.cache.clear();
        if !entries.is_empty() {
            debug!(instances = entries.len(), "kernel dropped; deactivating cached instances");
        }
        self.deactivate_entries(entries);
    }
}
