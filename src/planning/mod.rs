//! Activation plans: per-type constructor candidates, injectable members
//! and lifecycle hooks, built once and shared.

use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::key::TypeKey;
use crate::metadata::{
    ConstructorDescriptor, LifecycleDescriptor, MemberDescriptor, MetadataProvider, ParameterDescriptor,
};

/// Immutable description of how to build and wire one concrete type.
#[derive(Debug)]
pub struct Plan {
    implementation: TypeKey,
    constructors: Vec<ConstructorDescriptor>,
    members: Vec<MemberDescriptor>,
    lifecycle: LifecycleDescriptor,
}

impl Plan {
    fn build(implementation: TypeKey, provider: &dyn MetadataProvider) -> Self {
        let mut constructors = provider.describe_constructors(&implementation);
        // Stable: equal arities keep declaration order.
        constructors.sort_by(|a, b| b.arity().cmp(&a.arity()));
        Self {
            members: provider.describe_injectable_members(&implementation),
            lifecycle: provider.describe_lifecycle(&implementation),
            constructors,
            implementation,
        }
    }

    pub fn implementation(&self) -> &TypeKey {
        &self.implementation
    }

    /// Constructor candidates, richest first.
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// Members to inject after construction, in declaration order.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn lifecycle(&self) -> &LifecycleDescriptor {
        &self.lifecycle
    }

    pub fn is_constructible(&self) -> bool {
        !self.constructors.is_empty()
    }
}

/// Chooses the constructor to use given which parameters are resolvable.
///
/// The first candidate (richest first, declaration order among equal
/// arities) whose parameters are all resolvable wins; a zero-argument
/// constructor is therefore the natural fallback. On failure returns the
/// names of the parameter types that could not be resolved.
///
/// ```rust
/// use ferrous_kernel::{ParameterDescriptor, Planner, TypeRegistry, TypeKey};
/// use ferrous_kernel::planning::select_constructor;
/// use std::sync::Arc;
///
/// struct Report;
/// let registry = TypeRegistry::new();
/// registry.register::<Report>()
///     .default_constructor(|| Report)
///     .constructor([ParameterDescriptor::single::<String>("title")], |_| Ok(Report));
///
/// let planner = Planner::new(Arc::new(registry));
/// let plan = planner.get_plan(&TypeKey::of::<Report>());
///
/// let chosen = select_constructor(&plan, |_| true).unwrap();
/// assert_eq!(chosen.arity(), 1);
/// let chosen = select_constructor(&plan, |_| false).unwrap();
/// assert_eq!(chosen.arity(), 0);
/// ```
pub fn select_constructor<F>(plan: &Plan, mut is_resolvable: F) -> Result<&ConstructorDescriptor, Vec<&'static str>>
where
    F: FnMut(&ParameterDescriptor) -> bool,
{
    let mut missing: Vec<&'static str> = Vec::new();
    for constructor in &plan.constructors {
        let mut satisfiable = true;
        for parameter in &constructor.parameters {
            if !is_resolvable(parameter) {
                satisfiable = false;
                if !missing.contains(&parameter.service.name()) {
                    missing.push(parameter.service.name());
                }
            }
        }
        if satisfiable {
            return Ok(constructor);
        }
    }
    Err(missing)
}

/// Memoizing plan cache keyed by implementation type.
pub struct Planner {
    provider: Arc<dyn MetadataProvider>,
    plans: RwLock<AHashMap<TypeId, Arc<Plan>>>,
}

impl Planner {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            plans: RwLock::new(AHashMap::new()),
        }
    }

    /// Returns the plan for `implementation`, building it on first use.
    ///
    /// The build happens outside the lock; if two threads build the same
    /// plan concurrently the first insert wins and both get that plan.
    pub fn get_plan(&self, implementation: &TypeKey) -> Arc<Plan> {
        if let Some(plan) = self.plans.read().get(&implementation.id()) {
            return plan.clone();
        }

        let plan = Arc::new(Plan::build(implementation.clone(), self.provider.as_ref()));
        debug!(
            implementation = implementation.name(),
            constructors = plan.constructors.len(),
            members = plan.members.len(),
            "built activation plan"
        );
        self.plans
            .write()
            .entry(implementation.id())
            .or_insert(plan)
            .clone()
    }

    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.plans.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.read().is_empty()
    }
}
