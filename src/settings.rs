//! Kernel configuration.

#[cfg(feature = "config")]
use crate::error::{DiError, DiResult};

/// Behavioural switches for a [`Kernel`](crate::Kernel).
///
/// With the `config` feature, settings can be loaded from JSON or from
/// environment variables:
///
/// ```rust,ignore
/// // FERROUS_KERNEL_ALLOW_IMPLICIT_BINDINGS=false
/// let settings = KernelSettings::from_env("FERROUS_KERNEL")?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct KernelSettings {
    /// Synthesize transient self-bindings for unbound constructible types
    pub allow_implicit_bindings: bool,
    /// Maximum request depth before resolution fails with `DepthExceeded`
    pub max_depth: usize,
    /// Collect caches of dead scope objects at the start of each root resolution
    pub prune_on_resolve: bool,
    /// Look up plans for factory and constant instances so they receive
    /// member injection and lifecycle hooks
    pub inject_factory_instances: bool,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            allow_implicit_bindings: true,
            max_depth: 1024,
            prune_on_resolve: true,
            inject_factory_instances: true,
        }
    }
}

#[cfg(feature = "config")]
impl KernelSettings {
    /// Parses settings from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Configuration {
            message: format!("invalid kernel settings: {e}"),
        })
    }

    /// Defaults overridden by `{PREFIX}_ALLOW_IMPLICIT_BINDINGS`,
    /// `{PREFIX}_MAX_DEPTH`, `{PREFIX}_PRUNE_ON_RESOLVE` and
    /// `{PREFIX}_INJECT_FACTORY_INSTANCES`.
    pub fn from_env(prefix: &str) -> DiResult<Self> {
        let mut settings = Self::default();
        settings.apply_env(prefix)?;
        Ok(settings)
    }

    /// Applies environment overrides on top of the current values.
    pub fn apply_env(&mut self, prefix: &str) -> DiResult<()> {
        let var = |name: &str| std::env::var(format!("{prefix}_{name}")).ok();

        if let Some(value) = var("ALLOW_IMPLICIT_BINDINGS") {
            self.allow_implicit_bindings = parse_bool("ALLOW_IMPLICIT_BINDINGS", &value)?;
        }
        if let Some(value) = var("MAX_DEPTH") {
            self.max_depth = value.trim().parse().map_err(|_| DiError::Configuration {
                message: format!("{prefix}_MAX_DEPTH must be a positive integer, got {value:?}"),
            })?;
        }
        if let Some(value) = var("PRUNE_ON_RESOLVE") {
            self.prune_on_resolve = parse_bool("PRUNE_ON_RESOLVE", &value)?;
        }
        if let Some(value) = var("INJECT_FACTORY_INSTANCES") {
            self.inject_factory_instances = parse_bool("INJECT_FACTORY_INSTANCES", &value)?;
        }
        Ok(())
    }
}

#[cfg(feature = "config")]
fn parse_bool(name: &str, value: &str) -> DiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DiError::Configuration {
            message: format!("{name} must be a boolean, got {value:?}"),
        }),
    }
}
