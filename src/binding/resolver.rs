//! Binding selection for requests.

use std::sync::Arc;

use tracing::trace;

use super::{Binding, BindingStore};
use crate::activation::Request;
use crate::error::{DiError, DiResult};
use crate::metadata::MetadataProvider;

enum Selection {
    Bound(Arc<Binding>),
    SelfBindable,
    Nothing,
}

/// Chooses the binding(s) that answer a request.
///
/// Single resolution walks three precedence tiers: matching conditional
/// bindings, then matching unconditional explicit bindings, then implicit
/// self-bindings. The first non-empty tier wins; inside it, a lone
/// candidate is chosen, otherwise the unique `as_default` binding, and
/// anything else is ambiguous.
///
/// Multi-injection ignores tiers and returns every matching explicit
/// binding in registration order.
pub struct BindingResolver {
    store: Arc<BindingStore>,
    provider: Arc<dyn MetadataProvider>,
    allow_implicit: bool,
}

impl BindingResolver {
    pub fn new(store: Arc<BindingStore>, provider: Arc<dyn MetadataProvider>, allow_implicit: bool) -> Self {
        Self {
            store,
            provider,
            allow_implicit,
        }
    }

    /// Bindings registered for the requested service whose constraint and
    /// conditions hold, in registration order.
    pub fn candidates(&self, request: &Request) -> Vec<Arc<Binding>> {
        let mut bindings = self.store.bindings_for(request.service());
        bindings.retain(|b| request.constraint().matches(b.metadata()) && b.matches(request));
        bindings
    }

    /// Selects the binding for a single-instance request.
    ///
    /// `Ok(None)` is only returned for optional requests; required
    /// requests that find nothing fail with `MissingBinding`. May add an
    /// implicit self-binding to the store.
    pub fn resolve_single(&self, request: &Request) -> DiResult<Option<Arc<Binding>>> {
        match self.select(request)? {
            Selection::Bound(binding) => Ok(Some(binding)),
            Selection::SelfBindable => Ok(Some(
                self.store
                    .add_implicit(Binding::implicit(request.service().clone())),
            )),
            Selection::Nothing if request.is_optional() => Ok(None),
            Selection::Nothing => Err(DiError::MissingBinding {
                service: request.service().name(),
                chain: request.chain(),
            }),
        }
    }

    /// Whether a single-instance request would find a binding, without
    /// mutating the store.
    pub fn can_resolve(&self, request: &Request) -> bool {
        matches!(
            self.select(request),
            Ok(Selection::Bound(_) | Selection::SelfBindable)
        )
    }

    /// Every matching explicit binding, in registration order.
    pub fn resolve_all(&self, request: &Request) -> Vec<Arc<Binding>> {
        let mut bindings = self.candidates(request);
        bindings.retain(|b| !b.is_implicit());
        trace!(service = request.service().name(), count = bindings.len(), "multi-injection candidates");
        bindings
    }

    fn select(&self, request: &Request) -> DiResult<Selection> {
        let registered = self.store.bindings_for(request.service());
        let has_explicit = registered.iter().any(|b| !b.is_implicit());

        let matching: Vec<Arc<Binding>> = registered
            .into_iter()
            .filter(|b| request.constraint().matches(b.metadata()) && b.matches(request))
            .collect();

        let (conditional, rest): (Vec<_>, Vec<_>) = matching.into_iter().partition(|b| b.is_conditional());
        let (implicit, unconditional): (Vec<_>, Vec<_>) = rest.into_iter().partition(|b| b.is_implicit());

        for tier in [conditional, unconditional, implicit] {
            if !tier.is_empty() {
                return self.pick(request, tier).map(Selection::Bound);
            }
        }

        let service = request.service();
        if self.allow_implicit
            && !has_explicit
            && request.constraint().is_none()
            && !service.is_open()
            && self.provider.is_self_bindable(service)
        {
            return Ok(Selection::SelfBindable);
        }
        Ok(Selection::Nothing)
    }

    fn pick(&self, request: &Request, mut tier: Vec<Arc<Binding>>) -> DiResult<Arc<Binding>> {
        if tier.len() == 1 {
            return Ok(tier.remove(0));
        }
        let mut defaults = tier.iter().filter(|b| b.is_default());
        match (defaults.next(), defaults.next()) {
            (Some(default), None) => Ok(default.clone()),
            _ => Err(DiError::AmbiguousBinding {
                service: request.service().name(),
                chain: request.chain(),
                candidates: tier.iter().map(|b| b.describe()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Constraint, RequestMode};
    use crate::key::TypeKey;
    use crate::metadata::TypeRegistry;
    use crate::scope::ScopeToken;

    struct Widget;
    struct Unknown;

    fn resolver(allow_implicit: bool) -> (Arc<BindingStore>, BindingResolver) {
        let registry = TypeRegistry::new();
        registry.register::<Widget>().default_constructor(|| Widget);
        let store = Arc::new(BindingStore::new());
        let resolver = BindingResolver::new(store.clone(), Arc::new(registry), allow_implicit);
        (store, resolver)
    }

    fn request<T: 'static>(constraint: Constraint, mode: RequestMode) -> Request {
        Request::root(TypeKey::of::<T>(), constraint, mode, &ScopeToken::new_scope("test"), None)
    }

    #[test]
    fn conditional_bindings_take_precedence() {
        let (store, resolver) = resolver(true);
        store.add(Arc::new(Binding::bind::<Widget>().to_self().build()));
        let conditional = store.add(Arc::new(Binding::bind::<Widget>().to_self().when(|r| r.is_root()).build()));

        let chosen = resolver
            .resolve_single(&request::<Widget>(Constraint::None, RequestMode::Single))
            .unwrap()
            .unwrap();
        assert_eq!(chosen.id(), conditional);
    }

    #[test]
    fn ties_break_on_the_default_binding() {
        let (store, resolver) = resolver(true);
        store.add(Arc::new(Binding::bind::<Widget>().to_self().build()));
        store.add(Arc::new(Binding::bind::<Widget>().to_self().build()));

        let err = resolver
            .resolve_single(&request::<Widget>(Constraint::None, RequestMode::Single))
            .unwrap_err();
        assert!(matches!(err, DiError::AmbiguousBinding { ref candidates, .. } if candidates.len() == 2));

        let default = store.add(Arc::new(Binding::bind::<Widget>().to_self().as_default().build()));
        let chosen = resolver
            .resolve_single(&request::<Widget>(Constraint::None, RequestMode::Single))
            .unwrap()
            .unwrap();
        assert_eq!(chosen.id(), default);
    }

    #[test]
    fn implicit_self_binding_is_synthesized_once() {
        let (store, resolver) = resolver(true);
        let widget = request::<Widget>(Constraint::None, RequestMode::Single);

        assert!(resolver.can_resolve(&widget));
        assert!(store.is_empty());

        let first = resolver.resolve_single(&widget).unwrap().unwrap();
        let second = resolver.resolve_single(&widget).unwrap().unwrap();
        assert!(first.is_implicit());
        assert_eq!(first.id(), second.id());
        assert_eq!(store.len(), 1);

        // Implicit bindings never answer multi-injection.
        assert!(resolver
            .resolve_all(&request::<Widget>(Constraint::None, RequestMode::Many))
            .is_empty());
    }

    #[test]
    fn implicit_self_binding_requires_permission_and_metadata() {
        let (_, strict) = resolver(false);
        assert!(strict
            .resolve_single(&request::<Widget>(Constraint::None, RequestMode::Single))
            .unwrap_err()
            .is_missing_binding());

        let (_, lenient) = resolver(true);
        assert!(!lenient.can_resolve(&request::<Unknown>(Constraint::None, RequestMode::Single)));
        assert!(lenient
            .resolve_single(&request::<Unknown>(Constraint::None, RequestMode::Optional))
            .unwrap()
            .is_none());
        assert!(!lenient.can_resolve(&request::<Widget>(Constraint::named("x"), RequestMode::Single)));
    }

    #[test]
    fn constraints_filter_candidates() {
        let (store, resolver) = resolver(true);
        store.add(Arc::new(Binding::bind::<Widget>().to_self().named("left").build()));
        let right = store.add(Arc::new(
            Binding::bind::<Widget>().to_self().named("right").with_metadata("side", "r").build(),
        ));

        let named = resolver
            .resolve_single(&request::<Widget>(Constraint::named("right"), RequestMode::Single))
            .unwrap()
            .unwrap();
        assert_eq!(named.id(), right);

        let tagged = resolver.candidates(&request::<Widget>(Constraint::has("side"), RequestMode::Single));
        assert_eq!(tagged.len(), 1);
        assert_eq!(resolver.resolve_all(&request::<Widget>(Constraint::None, RequestMode::Many)).len(), 2);
    }
}
