//! # ferrous-kernel
//!
//! Binding-driven resolution and activation kernel for dependency injection in Rust.
//!
//! ## Features
//!
//! - **Bindings**: service types mapped to implementations, factories, constants or open generics
//! - **Contextual selection**: names, metadata constraints and conditions over the request chain
//! - **Planning**: memoized construction plans, richest satisfiable constructor first
//! - **Scopes**: transient, singleton, request, block and user-defined scope objects
//! - **Activation pipeline**: member injection and lifecycle hooks, undone in reverse on deactivation
//! - **Circular dependency detection**: errors carry the full request chain
//! - **Thread-safe**: concurrent resolution with at most one cached instance per binding and scope
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_kernel::{Binding, Kernel, ParameterDescriptor, Resolver, TypeRegistry};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[LOG] {message}")
//!     }
//! }
//!
//! struct Greeter {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! // Describe how types are constructed
//! let registry = TypeRegistry::new();
//! registry.register::<ConsoleLogger>().default_constructor(|| ConsoleLogger);
//! registry.register::<Greeter>()
//!     .constructor([ParameterDescriptor::single::<dyn Logger>("logger")], |args| {
//!         Ok(Greeter { logger: args.get::<dyn Logger>(0)? })
//!     });
//!
//! // Declare bindings
//! let kernel = Kernel::new(Arc::new(registry));
//! kernel.add_binding(
//!     Binding::bind::<dyn Logger>()
//!         .to::<ConsoleLogger>(|l| l as Arc<dyn Logger>)
//!         .in_singleton_scope()
//!         .build(),
//! );
//!
//! // Greeter is unbound but constructible: it is self-bound implicitly
//! let greeter = kernel.get::<Greeter>().unwrap();
//! assert_eq!(greeter.logger.log("hi"), "[LOG] hi");
//! ```
//!
//! ## Scopes
//!
//! - **Transient**: a new instance on every resolution (the default)
//! - **Singleton**: one instance per kernel
//! - **Request**: one instance per root resolution call
//! - **Block**: one instance per [`ActivationBlock`]
//! - **Custom**: one instance per object returned by a scope callback
//!
//! Cached instances are deactivated when their scope ends: disposers run,
//! startables are stopped, and binding deactivation actions fire.
//!
//! ```rust
//! use ferrous_kernel::{Binding, Dispose, Kernel, Resolver, TypeRegistry};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! static CLOSED: AtomicBool = AtomicBool::new(false);
//!
//! struct Connection;
//! impl Dispose for Connection {
//!     fn dispose(&self) {
//!         CLOSED.store(true, Ordering::SeqCst);
//!     }
//! }
//!
//! let registry = TypeRegistry::new();
//! registry.register::<Connection>().default_constructor(|| Connection).disposable();
//! let kernel = Kernel::new(Arc::new(registry));
//! kernel.add_binding(Binding::bind::<Connection>().in_singleton_scope().build());
//!
//! let a = kernel.get::<Connection>().unwrap();
//! let b = kernel.get::<Connection>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! kernel.dispose();
//! assert!(CLOSED.load(Ordering::SeqCst));
//! ```
//!
//! ## Contextual Bindings
//!
//! ```rust
//! use ferrous_kernel::{Binding, Kernel, ParameterDescriptor, Resolver, TypeRegistry};
//! use std::sync::Arc;
//!
//! trait Weapon: Send + Sync { fn name(&self) -> &'static str; }
//! struct Sword;
//! impl Weapon for Sword { fn name(&self) -> &'static str { "sword" } }
//! struct Shuriken;
//! impl Weapon for Shuriken { fn name(&self) -> &'static str { "shuriken" } }
//!
//! struct Samurai { weapon: Arc<dyn Weapon> }
//! struct Ninja { weapon: Arc<dyn Weapon> }
//!
//! let registry = TypeRegistry::new();
//! registry.register::<Sword>().default_constructor(|| Sword);
//! registry.register::<Shuriken>().default_constructor(|| Shuriken);
//! registry.register::<Samurai>()
//!     .constructor([ParameterDescriptor::single::<dyn Weapon>("weapon")], |a| Ok(Samurai { weapon: a.get(0)? }));
//! registry.register::<Ninja>()
//!     .constructor([ParameterDescriptor::single::<dyn Weapon>("weapon")], |a| Ok(Ninja { weapon: a.get(0)? }));
//!
//! let kernel = Kernel::new(Arc::new(registry));
//! kernel.add_binding(Binding::bind::<dyn Weapon>().to::<Sword>(|w| w as Arc<dyn Weapon>).build());
//! kernel.add_binding(
//!     Binding::bind::<dyn Weapon>()
//!         .to::<Shuriken>(|w| w as Arc<dyn Weapon>)
//!         .when_injected_into::<Ninja>()
//!         .build(),
//! );
//!
//! assert_eq!(kernel.get::<Samurai>().unwrap().weapon.name(), "sword");
//! assert_eq!(kernel.get::<Ninja>().unwrap().weapon.name(), "shuriken");
//! ```

// Module declarations
pub mod activation;
pub mod binding;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod kernel;
pub mod key;
pub mod metadata;
pub mod planning;
pub mod scope;
pub mod settings;
pub mod traits;

// Re-export core types
pub use activation::{
    ActivationIdentity, ActivationStrategy, BindingActionStrategy, Constraint, Context, DisposableStrategy,
    InitializableStrategy, InstanceReference, MemberInjectionStrategy, Pipeline, Request, RequestMode,
    StartableStrategy, Target,
};
pub use binding::{
    Binding, BindingBuilder, BindingId, BindingMetadata, BindingResolver, BindingStore, BindingTarget, ClosedGeneric,
};
pub use descriptors::BindingDescriptor;
pub use error::{DiError, DiResult};
pub use instance::AnyArc;
pub use kernel::{ActivationBlock, Kernel, KernelBuilder};
pub use key::{key_of_type, Generic, GenericInfo, TypeKey};
pub use metadata::{
    Argument, Arguments, ConstructorDescriptor, LifecycleDescriptor, MemberDescriptor, MemberKind, MetadataProvider,
    ParameterDescriptor, ParameterKind, TypeBuilder, TypeRegistry,
};
pub use planning::{Plan, Planner};
pub use scope::{Cache, ScopeObject, ScopeSelector, ScopeToken};
pub use settings::KernelSettings;
pub use traits::{Dispose, Initialize, Resolver, ResolverCore, Start};
