//! Requests: nodes of the per-call dependency tree.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use super::Context;
use crate::binding::BindingMetadata;
use crate::key::TypeKey;
use crate::scope::ScopeObject;

type WeakScope = Weak<dyn Any + Send + Sync>;

/// Name/metadata filter applied to candidate bindings.
#[derive(Clone, Default)]
pub enum Constraint {
    #[default]
    None,
    /// Only bindings carrying this name
    Named(String),
    /// Only bindings whose metadata satisfies the predicate
    Custom(Arc<dyn Fn(&BindingMetadata) -> bool + Send + Sync>),
}

impl Constraint {
    pub fn named(name: impl Into<String>) -> Self {
        Constraint::Named(name.into())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&BindingMetadata) -> bool + Send + Sync + 'static,
    {
        Constraint::Custom(Arc::new(predicate))
    }

    /// Only bindings declaring metadata `key`.
    pub fn has(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::custom(move |metadata| metadata.has(&key))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Constraint::None)
    }

    pub fn matches(&self, metadata: &BindingMetadata) -> bool {
        match self {
            Constraint::None => true,
            Constraint::Named(name) => metadata.name.as_deref() == Some(name.as_str()),
            Constraint::Custom(predicate) => predicate(metadata),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::None => f.write_str("None"),
            Constraint::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Constraint::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How many instances a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Single,
    /// Single, but an unbound service yields nothing instead of an error
    Optional,
    /// Every matching binding
    Many,
}

/// The parameter or member a child request is injected into.
#[derive(Debug, Clone)]
pub struct Target {
    /// Type being constructed or injected
    pub owner: TypeKey,
    /// Parameter name
    pub name: &'static str,
    /// Member name for member injection; `None` for constructor parameters
    pub member: Option<&'static str>,
}

/// One node of the dependency tree built for a resolution call.
///
/// A child request keeps its parent context alive, so conditions can
/// inspect the whole chain. Scope objects are only referenced weakly.
#[derive(Clone)]
pub struct Request {
    service: TypeKey,
    constraint: Constraint,
    mode: RequestMode,
    parent: Option<Arc<Context>>,
    target: Option<Target>,
    depth: usize,
    request_scope: WeakScope,
    block: Option<WeakScope>,
}

impl Request {
    pub(crate) fn root(
        service: TypeKey,
        constraint: Constraint,
        mode: RequestMode,
        request_scope: &ScopeObject,
        block: Option<&ScopeObject>,
    ) -> Self {
        Self {
            service,
            constraint,
            mode,
            parent: None,
            target: None,
            depth: 0,
            request_scope: Arc::downgrade(request_scope),
            block: block.map(Arc::downgrade),
        }
    }

    pub(crate) fn child(
        parent: &Arc<Context>,
        service: TypeKey,
        constraint: Constraint,
        mode: RequestMode,
        target: Option<Target>,
    ) -> Self {
        let owner = parent.request();
        Self {
            service,
            constraint,
            mode,
            parent: Some(parent.clone()),
            target,
            depth: owner.depth + 1,
            request_scope: owner.request_scope.clone(),
            block: owner.block.clone(),
        }
    }

    pub fn service(&self) -> &TypeKey {
        &self.service
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn is_optional(&self) -> bool {
        self.mode == RequestMode::Optional
    }

    pub fn is_multi(&self) -> bool {
        self.mode == RequestMode::Many
    }

    /// Context of the activation that issued this request.
    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Scope object of the resolution call; `None` once the call has completed.
    pub fn request_scope(&self) -> Option<ScopeObject> {
        self.request_scope.upgrade()
    }

    /// `None` outside an activation block, `Some(None)` once the block ended.
    pub fn block_scope(&self) -> Option<Option<ScopeObject>> {
        self.block.as_ref().map(Weak::upgrade)
    }

    /// Ancestor contexts, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Arc<Context>> {
        std::iter::successors(self.parent.as_ref(), |ctx| ctx.request().parent())
    }

    /// Whether any ancestor requested or constructs `ty`.
    pub fn has_ancestor(&self, ty: &TypeKey) -> bool {
        self.ancestors()
            .any(|ctx| ctx.request().service() == ty || ctx.implementation() == Some(ty))
    }

    /// Service names from the root request down to this one.
    pub fn chain(&self) -> Vec<&'static str> {
        let mut chain: Vec<&'static str> = self.ancestors().map(|ctx| ctx.request().service().name()).collect();
        chain.reverse();
        chain.push(self.service.name());
        chain
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("service", &self.service)
            .field("constraint", &self.constraint)
            .field("mode", &self.mode)
            .field("target", &self.target)
            .field("depth", &self.depth)
            .finish()
    }
}
