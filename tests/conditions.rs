use ferrous_kernel::{Binding, Constraint, Kernel, ParameterDescriptor, Resolver, TypeKey, TypeRegistry};
use std::sync::Arc;

// ===== Test Services =====

trait Weapon: Send + Sync {
    fn name(&self) -> &'static str;
}

struct Sword;
impl Weapon for Sword {
    fn name(&self) -> &'static str {
        "sword"
    }
}

struct Shuriken;
impl Weapon for Shuriken {
    fn name(&self) -> &'static str {
        "shuriken"
    }
}

struct Dagger;
impl Weapon for Dagger {
    fn name(&self) -> &'static str {
        "dagger"
    }
}

struct Samurai {
    weapon: Arc<dyn Weapon>,
}

struct Ninja {
    weapon: Arc<dyn Weapon>,
    backup: Arc<dyn Weapon>,
}

/// Trains a Samurai; used to test ancestor conditions.
struct Dojo {
    student: Arc<Samurai>,
}

fn weapon_param(name: &'static str) -> ParameterDescriptor {
    ParameterDescriptor::single::<dyn Weapon>(name)
}

fn setup() -> Kernel {
    let registry = TypeRegistry::new();
    registry.register::<Sword>().default_constructor(|| Sword);
    registry.register::<Shuriken>().default_constructor(|| Shuriken);
    registry.register::<Dagger>().default_constructor(|| Dagger);
    registry
        .register::<Samurai>()
        .constructor([weapon_param("weapon")], |args| Ok(Samurai { weapon: args.get(0)? }));
    registry
        .register::<Ninja>()
        .constructor([weapon_param("weapon"), weapon_param("backup")], |args| {
            Ok(Ninja {
                weapon: args.get(0)?,
                backup: args.get(1)?,
            })
        });
    registry
        .register::<Dojo>()
        .constructor([ParameterDescriptor::single::<Samurai>("student")], |args| {
            Ok(Dojo { student: args.get(0)? })
        });

    let kernel = Kernel::new(Arc::new(registry));
    kernel.add_binding(Binding::bind::<dyn Weapon>().to::<Sword>(|w| w as Arc<dyn Weapon>).build());
    kernel
}

// ===== Built-in Conditions =====

#[test]
fn injected_into_condition_targets_one_consumer() {
    let kernel = setup();
    kernel.add_binding(
        Binding::bind::<dyn Weapon>()
            .to::<Shuriken>(|w| w as Arc<dyn Weapon>)
            .when_injected_into::<Ninja>()
            .build(),
    );

    assert_eq!(kernel.get::<Samurai>().unwrap().weapon.name(), "sword");
    let ninja = kernel.get::<Ninja>().unwrap();
    assert_eq!(ninja.weapon.name(), "shuriken");
    assert_eq!(ninja.backup.name(), "shuriken");
    // At the root there is no consumer, so the unconditional binding applies.
    assert_eq!(kernel.get::<dyn Weapon>().unwrap().name(), "sword");
}

#[test]
fn target_name_condition_targets_one_parameter() {
    let kernel = setup();
    kernel.add_binding(
        Binding::bind::<dyn Weapon>()
            .to::<Dagger>(|w| w as Arc<dyn Weapon>)
            .when_target_named("backup")
            .build(),
    );

    let ninja = kernel.get::<Ninja>().unwrap();
    assert_eq!(ninja.weapon.name(), "sword");
    assert_eq!(ninja.backup.name(), "dagger");
}

#[test]
fn ancestor_condition_looks_up_the_whole_chain() {
    let kernel = setup();
    kernel.add_binding(
        Binding::bind::<dyn Weapon>()
            .to::<Shuriken>(|w| w as Arc<dyn Weapon>)
            .when_any_ancestor::<Dojo>()
            .build(),
    );

    assert_eq!(kernel.get::<Samurai>().unwrap().weapon.name(), "sword");
    assert_eq!(kernel.get::<Dojo>().unwrap().student.weapon.name(), "shuriken");
}

#[test]
fn custom_conditions_see_the_request() {
    let kernel = setup();
    kernel.add_binding(
        Binding::bind::<dyn Weapon>()
            .to::<Dagger>(|w| w as Arc<dyn Weapon>)
            .when(|request| request.depth() >= 2)
            .build(),
    );

    assert_eq!(kernel.get::<Samurai>().unwrap().weapon.name(), "sword");
    assert_eq!(kernel.get::<Dojo>().unwrap().student.weapon.name(), "dagger");
}

#[test]
fn two_matching_conditional_bindings_are_ambiguous() {
    let kernel = setup();
    for _ in 0..2 {
        kernel.add_binding(
            Binding::bind::<dyn Weapon>()
                .to::<Dagger>(|w| w as Arc<dyn Weapon>)
                .when_injected_into::<Samurai>()
                .build(),
        );
    }

    assert!(kernel.get::<Samurai>().is_err());
    assert!(kernel.get::<Ninja>().is_ok());
}

// ===== Constraints =====

#[test]
fn metadata_constraints_filter_bindings() {
    let kernel = setup();
    kernel.add_binding(
        Binding::bind::<dyn Weapon>()
            .to::<Dagger>(|w| w as Arc<dyn Weapon>)
            .with_metadata("concealed", "yes")
            .build(),
    );

    let concealed = kernel
        .resolve(&TypeKey::of::<dyn Weapon>(), Constraint::has("concealed"))
        .unwrap();
    let weapon = ferrous_kernel::instance::downcast::<dyn Weapon>(&concealed).unwrap();
    assert_eq!(weapon.name(), "dagger");

    let visible = kernel
        .resolve_all(
            &TypeKey::of::<dyn Weapon>(),
            Constraint::custom(|metadata| metadata.get("concealed").is_none()),
        )
        .unwrap();
    assert_eq!(visible.len(), 1);
}
