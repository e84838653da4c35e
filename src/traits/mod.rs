//! Resolution and lifecycle traits.

pub mod lifecycle;
pub mod resolver;

pub use lifecycle::{Dispose, Initialize, Start};
pub use resolver::{Resolver, ResolverCore};
