use ferrous_kernel::{Binding, DiError, Kernel, ParameterDescriptor, Resolver, ScopeToken, TypeRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

struct Shared;

struct Pair {
    first: Arc<Shared>,
    second: Arc<Shared>,
}

/// Counts constructions and disposals of `Shared`.
#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    disposed: AtomicUsize,
}

impl Counters {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

fn setup() -> (Kernel, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let registry = TypeRegistry::new();
    {
        let created = counters.clone();
        let disposed = counters.clone();
        registry
            .register::<Shared>()
            .default_constructor(move || {
                created.created.fetch_add(1, Ordering::SeqCst);
                Shared
            })
            .on_dispose(move |_| {
                disposed.disposed.fetch_add(1, Ordering::SeqCst);
            });
    }
    registry.register::<Pair>().constructor(
        [
            ParameterDescriptor::single::<Shared>("first"),
            ParameterDescriptor::single::<Shared>("second"),
        ],
        |args| {
            Ok(Pair {
                first: args.get(0)?,
                second: args.get(1)?,
            })
        },
    );
    (Kernel::new(Arc::new(registry)), counters)
}

// ===== Transient =====

#[test]
fn transient_instances_are_fresh_and_untracked() {
    let (kernel, counters) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_transient_scope().build());

    let pair = kernel.get::<Pair>().unwrap();
    assert!(!Arc::ptr_eq(&pair.first, &pair.second));
    assert_eq!(counters.created(), 2);
    assert_eq!(kernel.cached_instances(), 0);

    kernel.dispose();
    assert_eq!(counters.disposed(), 0);
}

// ===== Singleton =====

#[test]
fn singleton_is_shared_until_disposed() {
    let (kernel, counters) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_singleton_scope().build());

    let pair = kernel.get::<Pair>().unwrap();
    assert!(Arc::ptr_eq(&pair.first, &pair.second));
    assert!(Arc::ptr_eq(&pair.first, &kernel.get::<Shared>().unwrap()));
    assert_eq!(counters.created(), 1);

    assert_eq!(kernel.dispose(), 1);
    assert_eq!(counters.disposed(), 1);

    // A new singleton is created after the scope ended.
    let fresh = kernel.get::<Shared>().unwrap();
    assert!(!Arc::ptr_eq(&fresh, &pair.first));
    assert_eq!(counters.created(), 2);
}

#[test]
fn dropping_the_kernel_deactivates_singletons() {
    let (kernel, counters) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_singleton_scope().build());
    let _shared = kernel.get::<Shared>().unwrap();
    let clone = kernel.clone();

    drop(kernel);
    assert_eq!(counters.disposed(), 0);
    drop(clone);
    assert_eq!(counters.disposed(), 1);
}

// ===== Request =====

#[test]
fn request_scoped_instances_reach_the_caller_live() {
    let (kernel, counters) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_request_scope().build());

    let root = kernel.get::<Shared>().unwrap();
    assert_eq!(counters.disposed(), 0);
    assert_eq!(kernel.cached_instances(), 1);

    // The next call prunes the finished call's scope before resolving.
    let pair = kernel.get::<Pair>().unwrap();
    assert!(Arc::ptr_eq(&pair.first, &pair.second));
    assert!(!Arc::ptr_eq(&pair.first, &root));
    assert_eq!(counters.created(), 2);
    assert_eq!(counters.disposed(), 1);

    assert_eq!(kernel.prune(), 1);
    assert_eq!(counters.disposed(), 2);
    assert_eq!(kernel.cached_instances(), 0);
}

#[test]
fn failed_call_ends_its_request_scope_immediately() {
    struct Doomed;
    let (kernel, counters) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_request_scope().build());
    kernel.add_binding(
        Binding::bind::<Doomed>()
            .to_factory(|ctx| {
                ctx.get::<Shared>()?;
                Err(DiError::factory::<Doomed>("refused"))
            })
            .build(),
    );

    assert!(kernel.get::<Doomed>().is_err());
    assert_eq!(counters.created(), 1);
    assert_eq!(counters.disposed(), 1);
    assert_eq!(kernel.cached_instances(), 0);
}

// ===== Block =====

#[test]
fn block_scope_is_shared_within_a_block() {
    let (kernel, counters) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_block_scope().build());

    let block = kernel.begin_block();
    let a = block.get::<Shared>().unwrap();
    let pair = block.get::<Pair>().unwrap();
    assert!(Arc::ptr_eq(&a, &pair.first));
    assert!(Arc::ptr_eq(&a, &pair.second));

    let other = kernel.begin_block();
    assert!(!Arc::ptr_eq(&a, &other.get::<Shared>().unwrap()));
    assert_eq!(counters.created(), 2);

    assert_eq!(block.end(), 1);
    assert_eq!(counters.disposed(), 1);

    drop(other);
    assert_eq!(counters.disposed(), 2);
}

#[test]
fn block_scope_outside_a_block_is_a_scope_error() {
    let (kernel, _) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_block_scope().build());

    match kernel.get::<Shared>() {
        Err(DiError::WrongScope { service, reason }) => {
            assert!(service.contains("Shared"));
            assert!(reason.contains("outside"));
        }
        other => panic!("expected scope error, got {:?}", other.map(|_| ())),
    }
}

// ===== Custom =====

#[test]
fn custom_scope_caches_per_scope_object() {
    let (kernel, counters) = setup();
    let tenant = ScopeToken::new_scope("tenant");
    let selected = tenant.clone();
    kernel.add_binding(
        Binding::bind::<Shared>()
            .in_custom_scope(move |_| Some(selected.clone()))
            .build(),
    );

    let a = kernel.get::<Shared>().unwrap();
    let b = kernel.get::<Shared>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    assert_eq!(kernel.end_scope(&tenant), 1);
    assert_eq!(counters.disposed(), 1);
    assert!(!Arc::ptr_eq(&a, &kernel.get::<Shared>().unwrap()));
}

#[test]
fn dropped_scope_objects_are_pruned() {
    let (kernel, counters) = setup();
    let tenant = ScopeToken::new_scope("tenant");
    let weak = Arc::downgrade(&tenant);
    kernel.add_binding(
        Binding::bind::<Shared>()
            .in_custom_scope(move |_| weak.upgrade())
            .build(),
    );

    let _held = kernel.get::<Shared>().unwrap();
    assert_eq!(kernel.cached_instances(), 1);

    drop(tenant);
    assert_eq!(kernel.prune(), 1);
    assert_eq!(counters.disposed(), 1);

    // With the scope object gone the callback yields no scope: transient.
    kernel.get::<Shared>().unwrap();
    assert_eq!(kernel.cached_instances(), 0);
}

#[test]
fn dead_scopes_are_pruned_on_resolve() {
    let (kernel, counters) = setup();
    let tenant = ScopeToken::new_scope("tenant");
    let weak = Arc::downgrade(&tenant);
    kernel.add_binding(
        Binding::bind::<Shared>()
            .in_custom_scope(move |_| weak.upgrade())
            .build(),
    );
    kernel.get::<Shared>().unwrap();

    drop(tenant);
    kernel.get::<Pair>().unwrap();
    assert_eq!(counters.disposed(), 1);
}

// ===== Release =====

#[test]
fn release_evicts_one_instance() {
    let (kernel, counters) = setup();
    kernel.add_binding(Binding::bind::<Shared>().in_singleton_scope().build());

    let shared = kernel.get::<Shared>().unwrap();
    assert!(kernel.release_instance(&shared));
    assert!(!kernel.release_instance(&shared));
    assert_eq!(counters.disposed(), 1);
    assert!(!Arc::ptr_eq(&shared, &kernel.get::<Shared>().unwrap()));
}
