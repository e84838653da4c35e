//! Binding descriptors for introspection and diagnostics.

use crate::binding::{Binding, BindingId, BindingTarget};
use crate::key::TypeKey;

/// Snapshot of one registered binding.
///
/// Descriptors are detached copies: holding one does not keep the binding
/// registered, and later changes to the kernel do not show up in it.
///
/// # Use Cases
///
/// - **Debugging**: inspect what is bound and with which scope
/// - **Validation**: check that required services are bound at startup
/// - **Health checks**: verify kernel configuration before serving traffic
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{Binding, Kernel, TypeRegistry};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {}
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
///
/// let kernel = Kernel::new(Arc::new(TypeRegistry::new()));
/// kernel.add_binding(
///     Binding::bind::<dyn Logger>()
///         .to::<ConsoleLogger>(|l| l as Arc<dyn Logger>)
///         .in_singleton_scope()
///         .build(),
/// );
/// kernel.add_binding(Binding::bind::<u32>().to_constant(Arc::new(5432)).named("port").build());
///
/// let descriptors = kernel.binding_descriptors();
/// let logger = descriptors.iter().find(|d| d.type_name().contains("Logger")).unwrap();
/// assert_eq!(logger.scope, "singleton");
/// assert!(logger.implementation_name().unwrap().contains("ConsoleLogger"));
///
/// let port = descriptors.iter().find(|d| d.is_named()).unwrap();
/// assert_eq!(port.service_name(), Some("port"));
/// assert_eq!(port.target, "constant");
/// ```
#[derive(Debug, Clone)]
pub struct BindingDescriptor {
    pub id: BindingId,
    pub service: TypeKey,
    /// Concrete type for type bindings
    pub implementation: Option<TypeKey>,
    /// `type`, `factory`, `constant` or `open-generic`
    pub target: &'static str,
    pub scope: &'static str,
    pub name: Option<String>,
    pub is_conditional: bool,
    pub is_default: bool,
    pub is_implicit: bool,
    pub has_metadata: bool,
}

impl BindingDescriptor {
    /// Binding name, or `None` for unnamed bindings.
    pub fn service_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Service type name, as reported by `std::any::type_name`.
    pub fn type_name(&self) -> &'static str {
        self.service.name()
    }

    pub fn implementation_name(&self) -> Option<&'static str> {
        self.implementation.as_ref().map(TypeKey::name)
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

impl From<&Binding> for BindingDescriptor {
    fn from(binding: &Binding) -> Self {
        Self {
            id: binding.id(),
            service: binding.service().clone(),
            implementation: match binding.target() {
                BindingTarget::Type(key) => Some(key.clone()),
                _ => None,
            },
            target: binding.target().kind(),
            scope: binding.scope().name(),
            name: binding.name().map(str::to_owned),
            is_conditional: binding.is_conditional(),
            is_default: binding.is_default(),
            is_implicit: binding.is_implicit(),
            has_metadata: !binding.metadata().entries.is_empty(),
        }
    }
}
