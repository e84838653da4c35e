//! Scope selection.
//!
//! A scope is any shared object instances can be cached against. The
//! kernel never interprets scope objects; it only keys its cache off the
//! object a binding's [`ScopeSelector`] returns for a context.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::activation::Context;
use crate::error::{DiError, DiResult};

pub mod cache;

pub use cache::Cache;

/// Opaque scope key. Held weakly by the cache.
pub type ScopeObject = Arc<dyn Any + Send + Sync>;

/// User-defined scope callback.
pub type ScopeCallback = Arc<dyn Fn(&Context) -> Option<ScopeObject> + Send + Sync>;

/// Marker object used for kernel-created scopes (root, request, block).
#[derive(Debug)]
pub struct ScopeToken {
    label: &'static str,
}

impl ScopeToken {
    /// Creates a fresh scope object; each call yields a distinct scope.
    pub fn new_scope(label: &'static str) -> ScopeObject {
        Arc::new(ScopeToken { label })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Maps an activation context to the scope its instance is cached in.
#[derive(Clone, Default)]
pub enum ScopeSelector {
    /// No caching; a new instance per resolution
    #[default]
    Transient,
    /// One instance per kernel
    Singleton,
    /// One instance per root resolution call. The instances outlive the
    /// call and are deactivated by the first prune after it returns.
    Request,
    /// One instance per [`ActivationBlock`](crate::ActivationBlock)
    Block,
    /// Whatever object the callback returns; `None` means transient
    Custom(ScopeCallback),
}

impl ScopeSelector {
    pub fn custom<F>(select: F) -> Self
    where
        F: Fn(&Context) -> Option<ScopeObject> + Send + Sync + 'static,
    {
        ScopeSelector::Custom(Arc::new(select))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScopeSelector::Transient => "transient",
            ScopeSelector::Singleton => "singleton",
            ScopeSelector::Request => "request",
            ScopeSelector::Block => "block",
            ScopeSelector::Custom(_) => "custom",
        }
    }

    /// Scope object for `ctx`, or `None` for no caching.
    pub fn select(&self, ctx: &Context, root: &ScopeObject) -> DiResult<Option<ScopeObject>> {
        match self {
            ScopeSelector::Transient => Ok(None),
            ScopeSelector::Singleton => Ok(Some(root.clone())),
            ScopeSelector::Request => ctx.request().request_scope().map(Some).ok_or(DiError::WrongScope {
                service: ctx.request().service().name(),
                reason: "the resolution call owning this request has completed",
            }),
            ScopeSelector::Block => match ctx.request().block_scope() {
                Some(Some(block)) => Ok(Some(block)),
                Some(None) => Err(DiError::WrongScope {
                    service: ctx.request().service().name(),
                    reason: "the activation block has ended",
                }),
                None => Err(DiError::WrongScope {
                    service: ctx.request().service().name(),
                    reason: "block-scoped binding resolved outside an activation block",
                }),
            },
            ScopeSelector::Custom(select) => Ok(select(ctx)),
        }
    }
}

impl fmt::Debug for ScopeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
