use ferrous_kernel::{Binding, Constraint, DiError, Kernel, ParameterDescriptor, Resolver, TypeKey, TypeRegistry};
use std::sync::Arc;

// ===== Test Services =====

trait Child: Send + Sync {
    fn name(&self) -> &'static str;
}

struct ChildA;
impl Child for ChildA {
    fn name(&self) -> &'static str {
        "A"
    }
}

struct ChildB;
impl Child for ChildB {
    fn name(&self) -> &'static str {
        "B"
    }
}

trait Parent: Send + Sync {
    fn children(&self) -> &[Arc<dyn Child>];
}

struct Family {
    children: Vec<Arc<dyn Child>>,
}

impl Parent for Family {
    fn children(&self) -> &[Arc<dyn Child>] {
        &self.children
    }
}

struct Standalone;

fn setup() -> Kernel {
    let registry = TypeRegistry::new();
    registry.register::<ChildA>().default_constructor(|| ChildA);
    registry.register::<ChildB>().default_constructor(|| ChildB);
    registry.register::<Standalone>().default_constructor(|| Standalone);
    registry
        .register::<Family>()
        .constructor([ParameterDescriptor::many::<dyn Child>("children")], |args| {
            Ok(Family { children: args.all(0)? })
        });

    let kernel = Kernel::new(Arc::new(registry));
    kernel.add_binding(Binding::bind::<dyn Parent>().to::<Family>(|f| f as Arc<dyn Parent>).build());
    kernel
}

fn bind_children(kernel: &Kernel) {
    kernel.add_binding(Binding::bind::<dyn Child>().to::<ChildA>(|c| c as Arc<dyn Child>).named("a").build());
    kernel.add_binding(Binding::bind::<dyn Child>().to::<ChildB>(|c| c as Arc<dyn Child>).named("b").build());
}

fn names(children: &[Arc<dyn Child>]) -> Vec<&'static str> {
    children.iter().map(|c| c.name()).collect()
}

// ===== Collection Injection =====

#[test]
fn parent_receives_children_in_registration_order() {
    let kernel = setup();
    bind_children(&kernel);

    let parent = kernel.get::<dyn Parent>().unwrap();
    assert_eq!(names(parent.children()), ["A", "B"]);
}

#[test]
fn unbinding_children_leaves_an_empty_collection() {
    let kernel = setup();
    bind_children(&kernel);
    assert_eq!(kernel.get::<dyn Parent>().unwrap().children().len(), 2);

    assert_eq!(kernel.unbind::<dyn Child>(), 2);
    let parent = kernel.get::<dyn Parent>().unwrap();
    assert!(parent.children().is_empty());
}

#[test]
fn each_child_binding_is_activated_independently() {
    let kernel = setup();
    kernel.add_binding(
        Binding::bind::<dyn Child>()
            .to::<ChildA>(|c| c as Arc<dyn Child>)
            .in_singleton_scope()
            .build(),
    );
    kernel.add_binding(Binding::bind::<dyn Child>().to::<ChildB>(|c| c as Arc<dyn Child>).build());

    let first = kernel.get_all::<dyn Child>().unwrap();
    let second = kernel.get_all::<dyn Child>().unwrap();
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(!Arc::ptr_eq(&first[1], &second[1]));
}

// ===== Empty vs Missing =====

#[test]
fn unbound_collection_is_empty_but_single_is_missing() {
    let kernel = setup();

    assert!(kernel.get_all::<dyn Child>().unwrap().is_empty());
    assert!(kernel.get::<dyn Child>().err().unwrap().is_missing_binding());
}

#[test]
fn implicit_self_bindings_do_not_join_collections() {
    let kernel = setup();

    assert!(kernel.get::<Standalone>().is_ok());
    assert!(kernel.get_all::<Standalone>().unwrap().is_empty());
}

// ===== Single Resolution Over Several Bindings =====

#[test]
fn single_resolution_over_two_bindings_is_ambiguous() {
    let kernel = setup();
    bind_children(&kernel);

    match kernel.get::<dyn Child>() {
        Err(DiError::AmbiguousBinding { candidates, .. }) => assert_eq!(candidates.len(), 2),
        other => panic!("expected ambiguity, got {:?}", other.map(|c| c.name())),
    }
}

#[test]
fn default_binding_breaks_the_tie() {
    let kernel = setup();
    bind_children(&kernel);
    kernel.add_binding(
        Binding::bind::<dyn Child>()
            .to::<ChildB>(|c| c as Arc<dyn Child>)
            .as_default()
            .build(),
    );

    assert_eq!(kernel.get::<dyn Child>().unwrap().name(), "B");
    assert_eq!(kernel.get_all::<dyn Child>().unwrap().len(), 3);
}

#[test]
fn constrained_collections_filter_by_name() {
    let kernel = setup();
    bind_children(&kernel);

    let only_b = kernel.resolve_all(&TypeKey::of::<dyn Child>(), Constraint::named("b")).unwrap();
    assert_eq!(only_b.len(), 1);
    let child = ferrous_kernel::instance::downcast::<dyn Child>(&only_b[0]).unwrap();
    assert_eq!(child.name(), "B");
}
