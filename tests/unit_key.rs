/// Unit tests for TypeKey methods

use ferrous_kernel::{key_of_type, Generic, TypeKey};
use std::collections::HashSet;
use std::marker::PhantomData;

trait Plugin: Send + Sync {}

struct Pair<A, B>(PhantomData<(A, B)>);

impl<A: 'static, B: 'static> Generic for Pair<A, B> {
    const FAMILY: &'static str = "Pair";

    fn type_arguments() -> Vec<TypeKey> {
        vec![TypeKey::of::<A>(), TypeKey::of::<B>()]
    }
}

#[test]
fn test_key_name_concrete_type() {
    let key = TypeKey::of::<String>();
    assert_eq!(key.name(), "alloc::string::String");
    assert_eq!(key.to_string(), "alloc::string::String");
    assert_eq!(format!("{:?}", key), "TypeKey(alloc::string::String)");
}

#[test]
fn test_key_name_trait_object() {
    let key = TypeKey::of::<dyn Plugin>();
    assert!(key.name().starts_with("dyn "));
    assert!(key.name().ends_with("Plugin"));
    assert!(key.family().is_none());
    assert_eq!(key.arity(), 0);
    assert!(key.type_arguments().is_empty());
}

#[test]
fn test_key_equality_by_type_id() {
    assert_eq!(TypeKey::of::<u32>(), TypeKey::of::<u32>());
    assert_ne!(TypeKey::of::<u32>(), TypeKey::of::<u64>());
    assert_ne!(TypeKey::of::<dyn Plugin>(), TypeKey::of::<Box<dyn Plugin>>());
    assert_eq!(key_of_type::<u32>(), TypeKey::of::<u32>());
}

#[test]
fn test_closed_generic_key() {
    let key = TypeKey::of_generic::<Pair<u8, String>>();
    assert_eq!(key.family(), Some("Pair"));
    assert_eq!(key.arity(), 2);
    assert_eq!(
        key.type_arguments(),
        &[TypeKey::of::<u8>(), TypeKey::of::<String>()]
    );
    assert!(!key.is_open());

    // Family information does not affect identity.
    assert_eq!(key, TypeKey::of::<Pair<u8, String>>());
    assert_ne!(key, TypeKey::of_generic::<Pair<String, u8>>());
}

#[test]
fn test_open_key() {
    let key = TypeKey::open("Pair", 2);
    assert!(key.is_open());
    assert_eq!(key.family(), Some("Pair"));
    assert_eq!(key.arity(), 2);
    assert_eq!(key.name(), "Pair");
    assert_eq!(format!("{:?}", key), "TypeKey(Pair<_,_>)");

    assert_eq!(key, TypeKey::open("Pair", 2));
    assert_ne!(key, TypeKey::open("Pair", 1));
    assert_ne!(key, TypeKey::of_generic::<Pair<u8, u8>>());
}

#[test]
fn test_key_hashing_matches_equality() {
    let mut set = HashSet::new();
    set.insert(TypeKey::of::<u32>());
    set.insert(TypeKey::of::<u32>());
    set.insert(TypeKey::of_generic::<Pair<u8, u8>>());
    set.insert(TypeKey::of::<Pair<u8, u8>>());
    set.insert(TypeKey::open("Pair", 2));
    set.insert(TypeKey::open("Pair", 2));
    set.insert(TypeKey::open("Pair", 1));
    set.insert(TypeKey::open("Other", 2));

    assert_eq!(set.len(), 5);
}

#[test]
fn test_key_clone_preserves_everything() {
    let key = TypeKey::of_generic::<Pair<u8, String>>();
    let cloned = key.clone();
    assert_eq!(cloned, key);
    assert_eq!(cloned.id(), key.id());
    assert_eq!(cloned.family(), key.family());
    assert_eq!(cloned.type_arguments(), key.type_arguments());
}
