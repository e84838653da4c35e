//! The standard activation strategies.

use super::context::{Context, InstanceReference};
use super::pipeline::ActivationStrategy;
use crate::error::DiResult;
use crate::instance::AnyArc;
use crate::metadata::LifecycleHook;

/// Runs every hook; reports the first failure after all have run.
fn run_hooks(hooks: &[LifecycleHook], instance: &AnyArc) -> DiResult<()> {
    let mut first_error = None;
    for hook in hooks {
        if let Err(error) = hook(instance) {
            first_error.get_or_insert(error);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Runs hooks in order, stopping at the first failure.
fn run_hooks_strict(hooks: &[LifecycleHook], instance: &AnyArc) -> DiResult<()> {
    hooks.iter().try_for_each(|hook| hook(instance))
}

/// Injects the members the plan lists, in declaration order.
///
/// Applies to planner-constructed instances and to factory/constant
/// instances whose concrete type the metadata provider knows.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemberInjectionStrategy;

impl ActivationStrategy for MemberInjectionStrategy {
    fn name(&self) -> &'static str {
        "MemberInjectionStrategy"
    }

    fn activate(&self, ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        ctx.inject_members(reference)
    }
}

/// Calls the type's initialize hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct InitializableStrategy;

impl ActivationStrategy for InitializableStrategy {
    fn name(&self) -> &'static str {
        "InitializableStrategy"
    }

    fn activate(&self, _ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        match &reference.plan {
            Some(plan) => run_hooks_strict(&plan.lifecycle().initializers, &reference.instance),
            None => Ok(()),
        }
    }
}

/// Starts on activation, stops on deactivation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StartableStrategy;

impl ActivationStrategy for StartableStrategy {
    fn name(&self) -> &'static str {
        "StartableStrategy"
    }

    fn activate(&self, _ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        match &reference.plan {
            Some(plan) => run_hooks_strict(&plan.lifecycle().starters, &reference.instance),
            None => Ok(()),
        }
    }

    fn deactivate(&self, _ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        match &reference.plan {
            Some(plan) => run_hooks(&plan.lifecycle().stoppers, &reference.instance),
            None => Ok(()),
        }
    }
}

/// Runs the binding's own activation/deactivation actions on the service view.
#[derive(Debug, Default, Clone, Copy)]
pub struct BindingActionStrategy;

impl ActivationStrategy for BindingActionStrategy {
    fn name(&self) -> &'static str {
        "BindingActionStrategy"
    }

    fn activate(&self, ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        ctx.binding()
            .activation_actions()
            .iter()
            .try_for_each(|action| action(&reference.service))
    }

    fn deactivate(&self, ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        let mut first_error = None;
        for action in ctx.binding().deactivation_actions() {
            if let Err(error) = action(&reference.service) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Disposes the instance when it is deactivated.
///
/// Cached instances are deactivated when their scope ends, when they are
/// released, or when their dead scope is pruned. Transient instances are
/// not tracked and are never disposed by the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisposableStrategy;

impl ActivationStrategy for DisposableStrategy {
    fn name(&self) -> &'static str {
        "DisposableStrategy"
    }

    fn deactivate(&self, _ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        match &reference.plan {
            Some(plan) => run_hooks(&plan.lifecycle().disposers, &reference.instance),
            None => Ok(()),
        }
    }
}
