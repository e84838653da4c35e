//! Request graph, activation contexts and the activation pipeline.

pub mod context;
pub mod pipeline;
pub mod request;
pub mod strategies;

pub use context::{ActivationIdentity, Context, InstanceReference};
pub use pipeline::{ActivationStrategy, Pipeline};
pub use request::{Constraint, Request, RequestMode, Target};
pub use strategies::{
    BindingActionStrategy, DisposableStrategy, InitializableStrategy, MemberInjectionStrategy, StartableStrategy,
};
