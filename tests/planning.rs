use ferrous_kernel::{Binding, DiError, Kernel, ParameterDescriptor, Resolver, TypeKey, TypeRegistry};
use std::sync::{Arc, Mutex};

// ===== Test Services =====

struct Alpha;
struct Beta;
struct Gamma;

/// Records which constructor built it.
struct Multi {
    arity: usize,
}

struct FallsBack {
    used_default: bool,
}

struct Stuck;

struct Tied {
    label: &'static str,
}

struct WithOptional {
    gamma: Option<Arc<Gamma>>,
}

struct WithDefault {
    port: Arc<u16>,
}

struct NamedDependency {
    port: Arc<u16>,
}

fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry
        .register::<Multi>()
        .constructor([ParameterDescriptor::single::<Alpha>("alpha")], |_| Ok(Multi { arity: 1 }))
        .constructor(
            [
                ParameterDescriptor::single::<Alpha>("alpha"),
                ParameterDescriptor::single::<Beta>("beta"),
                ParameterDescriptor::single::<Gamma>("gamma"),
            ],
            |_| Ok(Multi { arity: 3 }),
        )
        .default_constructor(|| Multi { arity: 0 });
    registry
        .register::<FallsBack>()
        .constructor([ParameterDescriptor::single::<Gamma>("gamma")], |_| {
            Ok(FallsBack { used_default: false })
        })
        .default_constructor(|| FallsBack { used_default: true });
    registry
        .register::<Stuck>()
        .constructor([ParameterDescriptor::single::<Gamma>("gamma")], |_| Ok(Stuck));
    registry
        .register::<Tied>()
        .constructor([ParameterDescriptor::single::<Alpha>("alpha")], |_| Ok(Tied { label: "alpha" }))
        .constructor([ParameterDescriptor::single::<Beta>("beta")], |_| Ok(Tied { label: "beta" }));
    registry
        .register::<WithOptional>()
        .constructor([ParameterDescriptor::optional::<Gamma>("gamma")], |args| {
            Ok(WithOptional { gamma: args.optional(0)? })
        });
    registry
        .register::<WithDefault>()
        .constructor(
            [ParameterDescriptor::single::<u16>("port").with_default(|| Arc::new(8080u16))],
            |args| Ok(WithDefault { port: args.get(0)? }),
        );
    registry
        .register::<NamedDependency>()
        .constructor([ParameterDescriptor::single::<u16>("port").named("admin")], |args| {
            Ok(NamedDependency { port: args.get(0)? })
        });
    registry
}

fn bind_constant<T: Send + Sync + 'static>(kernel: &Kernel, value: T) {
    kernel.add_binding(Binding::bind::<T>().to_constant(Arc::new(value)).build());
}

// ===== Constructor Selection =====

#[test]
fn richest_satisfiable_constructor_wins() {
    let kernel = Kernel::new(Arc::new(registry()));
    bind_constant(&kernel, Alpha);
    bind_constant(&kernel, Beta);
    bind_constant(&kernel, Gamma);

    assert_eq!(kernel.get::<Multi>().unwrap().arity, 3);
}

#[test]
fn unsatisfiable_richer_constructors_are_skipped() {
    let kernel = Kernel::new(Arc::new(registry()));
    bind_constant(&kernel, Alpha);
    bind_constant(&kernel, Beta);

    assert_eq!(kernel.get::<Multi>().unwrap().arity, 1);
}

#[test]
fn zero_argument_constructor_is_the_fallback() {
    let kernel = Kernel::new(Arc::new(registry()));
    assert_eq!(kernel.get::<Multi>().unwrap().arity, 0);
    assert!(kernel.get::<FallsBack>().unwrap().used_default);

    bind_constant(&kernel, Gamma);
    assert!(!kernel.get::<FallsBack>().unwrap().used_default);
}

#[test]
fn unsatisfiable_plan_names_missing_parameters() {
    let kernel = Kernel::new(Arc::new(registry()));

    match kernel.get::<Stuck>() {
        Err(DiError::UnresolvablePlan { implementation, missing, chain }) => {
            assert!(implementation.contains("Stuck"));
            assert_eq!(missing.len(), 1);
            assert!(missing[0].contains("Gamma"));
            assert_eq!(chain.len(), 1);
        }
        other => panic!("expected unresolvable plan, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn equal_arity_ties_follow_declaration_order() {
    let kernel = Kernel::new(Arc::new(registry()));
    bind_constant(&kernel, Alpha);
    bind_constant(&kernel, Beta);
    assert_eq!(kernel.get::<Tied>().unwrap().label, "alpha");

    kernel.unbind::<Alpha>();
    assert_eq!(kernel.get::<Tied>().unwrap().label, "beta");
}

// ===== Parameter Kinds =====

#[test]
fn optional_parameters_tolerate_missing_bindings() {
    let kernel = Kernel::new(Arc::new(registry()));
    assert!(kernel.get::<WithOptional>().unwrap().gamma.is_none());

    bind_constant(&kernel, Gamma);
    assert!(kernel.get::<WithOptional>().unwrap().gamma.is_some());
}

#[test]
fn default_values_fill_unbound_parameters() {
    let kernel = Kernel::new(Arc::new(registry()));
    assert_eq!(*kernel.get::<WithDefault>().unwrap().port, 8080);

    bind_constant(&kernel, 9090u16);
    assert_eq!(*kernel.get::<WithDefault>().unwrap().port, 9090);
}

#[test]
fn named_parameters_select_named_bindings() {
    let kernel = Kernel::new(Arc::new(registry()));
    kernel.add_binding(Binding::bind::<u16>().to_constant(Arc::new(80)).named("public").build());
    kernel.add_binding(Binding::bind::<u16>().to_constant(Arc::new(9000)).named("admin").build());

    assert_eq!(*kernel.get::<NamedDependency>().unwrap().port, 9000);
}

// ===== Plans and Ordering =====

#[test]
fn plans_are_memoized_per_type() {
    let kernel = Kernel::new(Arc::new(registry()));
    let first = kernel.plan_for(&TypeKey::of::<Multi>());
    let second = kernel.plan_for(&TypeKey::of::<Multi>());
    assert!(Arc::ptr_eq(&first, &second));
    // Richest first, declaration order among equals.
    let arities: Vec<usize> = first.constructors().iter().map(|c| c.arity()).collect();
    assert_eq!(arities, [3, 1, 0]);
}

type Order = Arc<Mutex<Vec<&'static str>>>;

fn recording<T: Send + Sync + 'static>(order: &Order, name: &'static str, make: fn() -> T) -> Binding {
    let order = order.clone();
    Binding::bind::<T>()
        .to_factory(move |_| {
            order.lock().unwrap().push(name);
            Ok(Arc::new(make()))
        })
        .build()
}

#[test]
fn dependencies_are_built_left_to_right_then_members() {
    struct Root;
    struct First;
    struct Second;
    struct Member;

    let registry = TypeRegistry::new();
    registry
        .register::<Root>()
        .constructor(
            [
                ParameterDescriptor::single::<First>("first"),
                ParameterDescriptor::single::<Second>("second"),
            ],
            |_| Ok(Root),
        )
        .property::<Member, _>("member", |_, _| {});

    let order: Order = Arc::default();
    let kernel = Kernel::new(Arc::new(registry));
    kernel.add_binding(recording(&order, "member", || Member));
    kernel.add_binding(recording(&order, "second", || Second));
    kernel.add_binding(recording(&order, "first", || First));

    kernel.get::<Root>().unwrap();
    kernel.get::<Root>().unwrap();
    assert_eq!(*order.lock().unwrap(), ["first", "second", "member", "first", "second", "member"]);
}
