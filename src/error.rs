//! Error types for the resolution kernel.

use std::sync::Arc;

use thiserror::Error;

/// Resolution and activation errors.
///
/// Every variant fails the enclosing resolution call synchronously. Variants
/// carry the request chain (root service first) so a failure can be
/// diagnosed without re-running it.
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{DiError, Kernel, Resolver, TypeRegistry};
/// use std::sync::Arc;
///
/// trait Mailer: Send + Sync {}
///
/// let kernel = Kernel::new(Arc::new(TypeRegistry::new()));
/// match kernel.get::<dyn Mailer>() {
///     Err(DiError::MissingBinding { service, chain }) => {
///         assert!(service.contains("Mailer"));
///         assert_eq!(chain.len(), 1);
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No binding and no viable self-binding for a single-instance request
    #[error("No binding available for {service} (request chain: {})", .chain.join(" -> "))]
    MissingBinding {
        service: &'static str,
        chain: Vec<&'static str>,
    },

    /// More than one binding of equal precedence matched and none is the default
    #[error("Ambiguous bindings for {service}: [{}] (request chain: {})", .candidates.join(", "), .chain.join(" -> "))]
    AmbiguousBinding {
        service: &'static str,
        chain: Vec<&'static str>,
        candidates: Vec<String>,
    },

    /// No constructor could be satisfied and no zero-argument fallback exists
    #[error("Cannot construct {implementation}: no satisfiable constructor (missing: [{}], request chain: {})", .missing.join(", "), .chain.join(" -> "))]
    UnresolvablePlan {
        implementation: &'static str,
        chain: Vec<&'static str>,
        missing: Vec<&'static str>,
    },

    /// A type is required while it is already under construction in the same chain
    #[error("Circular dependency: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<&'static str> },

    /// An activation strategy failed; earlier strategies were rolled back
    #[error("Activation of {implementation} failed in {strategy}: {source}")]
    ActivationFailure {
        implementation: &'static str,
        strategy: &'static str,
        chain: Vec<&'static str>,
        #[source]
        source: Arc<DiError>,
    },

    /// The binding's scope cannot be used from this resolution root
    #[error("Scope error for {service}: {reason}")]
    WrongScope {
        service: &'static str,
        reason: &'static str,
    },

    /// Type downcast failed
    #[error("Type mismatch for: {expected}")]
    TypeMismatch { expected: &'static str },

    /// Maximum request depth exceeded
    #[error("Max depth {depth} exceeded (request chain: {})", .chain.join(" -> "))]
    DepthExceeded {
        depth: usize,
        chain: Vec<&'static str>,
    },

    /// A user-supplied factory, injector or hook reported a failure
    #[error("Factory for {service} failed: {message}")]
    Factory {
        service: &'static str,
        message: String,
    },

    /// Kernel settings could not be loaded
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DiError {
    /// Convenience constructor for failures raised by user code.
    pub fn factory<T: ?Sized + 'static>(message: impl Into<String>) -> Self {
        DiError::Factory {
            service: std::any::type_name::<T>(),
            message: message.into(),
        }
    }

    /// Request chain attached to this error, root service first.
    pub fn chain(&self) -> &[&'static str] {
        match self {
            DiError::MissingBinding { chain, .. }
            | DiError::AmbiguousBinding { chain, .. }
            | DiError::UnresolvablePlan { chain, .. }
            | DiError::CircularDependency { chain }
            | DiError::ActivationFailure { chain, .. }
            | DiError::DepthExceeded { chain, .. } => chain,
            _ => &[],
        }
    }

    /// Whether the root cause is a missing binding, even when it surfaced
    /// through a failed activation (e.g. member injection).
    pub fn is_missing_binding(&self) -> bool {
        matches!(self.root_cause(), DiError::MissingBinding { .. })
    }

    /// Whether the root cause is a circular dependency.
    pub fn is_circular(&self) -> bool {
        matches!(self.root_cause(), DiError::CircularDependency { .. })
    }

    /// Innermost error, looking through activation failures.
    pub fn root_cause(&self) -> &DiError {
        match self {
            DiError::ActivationFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for kernel operations.
///
/// ```rust
/// use ferrous_kernel::{DiError, DiResult};
///
/// fn connect() -> DiResult<()> {
///     Err(DiError::factory::<String>("connection refused"))
/// }
///
/// assert!(connect().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_is_exposed_for_graph_errors() {
        let err = DiError::CircularDependency {
            chain: vec!["A", "B", "A"],
        };
        assert_eq!(err.chain(), &["A", "B", "A"]);
        assert!(err.is_circular());

        let err = DiError::TypeMismatch { expected: "u32" };
        assert!(err.chain().is_empty());
    }

    #[test]
    fn root_cause_unwraps_nested_activation_failures() {
        let inner = DiError::factory::<u32>("boom");
        let outer = DiError::ActivationFailure {
            implementation: "Outer",
            strategy: "InitializableStrategy",
            chain: vec!["Outer"],
            source: Arc::new(DiError::ActivationFailure {
                implementation: "Inner",
                strategy: "StartableStrategy",
                chain: vec!["Outer", "Inner"],
                source: Arc::new(inner),
            }),
        };
        assert!(matches!(outer.root_cause(), DiError::Factory { message, .. } if message == "boom"));
    }

    #[test]
    fn classification_looks_through_activation_failures() {
        let wrap = |source: DiError| DiError::ActivationFailure {
            implementation: "Service",
            strategy: "MemberInjectionStrategy",
            chain: vec!["Service"],
            source: Arc::new(source),
        };

        let circular = wrap(DiError::CircularDependency {
            chain: vec!["Service", "Dependency", "Service"],
        });
        assert!(circular.is_circular());
        assert!(!circular.is_missing_binding());

        let missing = wrap(DiError::MissingBinding {
            service: "Dependency",
            chain: vec!["Service", "Dependency"],
        });
        assert!(missing.is_missing_binding());
        assert!(!missing.is_circular());

        assert!(!wrap(DiError::factory::<u32>("boom")).is_circular());
    }
}
