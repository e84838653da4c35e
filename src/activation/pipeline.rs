//! Ordered activation/deactivation pipeline.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::context::{Context, InstanceReference};
use super::strategies::{
    BindingActionStrategy, DisposableStrategy, InitializableStrategy, MemberInjectionStrategy, StartableStrategy,
};
use crate::error::{DiError, DiResult};

/// One stage of the pipeline. Strategies hold no per-instance state.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ActivationStrategy, Context, DiResult, InstanceReference, Kernel, TypeRegistry};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct CountActivations(AtomicUsize);
///
/// impl ActivationStrategy for CountActivations {
///     fn name(&self) -> &'static str {
///         "CountActivations"
///     }
///
///     fn activate(&self, _ctx: &Context, _reference: &InstanceReference) -> DiResult<()> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let kernel = Kernel::builder(Arc::new(TypeRegistry::new()))
///     .strategy(Arc::new(CountActivations::default()))
///     .build();
/// assert_eq!(kernel.pipeline().len(), 6);
/// ```
pub trait ActivationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn activate(&self, _ctx: &Context, _reference: &InstanceReference) -> DiResult<()> {
        Ok(())
    }

    fn deactivate(&self, _ctx: &Context, _reference: &InstanceReference) -> DiResult<()> {
        Ok(())
    }
}

/// Strategies run in order on activation and in reverse on deactivation.
#[derive(Clone)]
pub struct Pipeline {
    strategies: Vec<Arc<dyn ActivationStrategy>>,
}

impl Pipeline {
    pub fn new(strategies: Vec<Arc<dyn ActivationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Member injection, initialize, start, binding actions, dispose.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(MemberInjectionStrategy),
            Arc::new(InitializableStrategy),
            Arc::new(StartableStrategy),
            Arc::new(BindingActionStrategy),
            Arc::new(DisposableStrategy),
        ])
    }

    pub fn push(&mut self, strategy: Arc<dyn ActivationStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategies(&self) -> &[Arc<dyn ActivationStrategy>] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs every strategy's activation step in order.
    ///
    /// When a step fails, the steps that already succeeded are undone by
    /// running their deactivation in reverse, and the failure is reported
    /// as `ActivationFailure` naming the failing strategy.
    pub fn activate(&self, ctx: &Context, reference: &InstanceReference) -> DiResult<()> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            if let Err(source) = strategy.activate(ctx, reference) {
                warn!(
                    implementation = ctx.display_name(),
                    strategy = strategy.name(),
                    error = %source,
                    "activation failed; rolling back"
                );
                Self::deactivate_all(ctx, reference, &self.strategies[..index]);
                return Err(DiError::ActivationFailure {
                    implementation: ctx.display_name(),
                    strategy: strategy.name(),
                    chain: ctx.request().chain(),
                    source: Arc::new(source),
                });
            }
        }
        debug!(implementation = ctx.display_name(), "activated");
        Ok(())
    }

    /// Runs every strategy's deactivation step in reverse order. Failures
    /// are logged and do not stop the remaining steps.
    pub fn deactivate(&self, ctx: &Context, reference: &InstanceReference) {
        Self::deactivate_all(ctx, reference, &self.strategies);
        debug!(implementation = ctx.display_name(), "deactivated");
    }

    fn deactivate_all(ctx: &Context, reference: &InstanceReference, strategies: &[Arc<dyn ActivationStrategy>]) {
        for strategy in strategies.iter().rev() {
            if let Err(error) = strategy.deactivate(ctx, reference) {
                warn!(
                    implementation = ctx.display_name(),
                    strategy = strategy.name(),
                    %error,
                    "deactivation step failed"
                );
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}
