//! Type identity keys for bindings, plans and requests.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a service or implementation type.
///
/// Keys compare by [`TypeId`] only; the type name is carried for
/// diagnostics. A key may additionally describe a generic *family*
/// (type-constructor name plus type arguments) so that open-generic
/// bindings can be unified against closed requests.
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::TypeKey;
///
/// trait Logger: Send + Sync {}
///
/// let a = TypeKey::of::<String>();
/// let b = TypeKey::of::<String>();
/// assert_eq!(a, b);
/// assert_eq!(a.name(), "alloc::string::String");
///
/// // Trait objects have keys too
/// let logger = TypeKey::of::<dyn Logger>();
/// assert_ne!(logger, a);
/// ```
#[derive(Clone)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    generic: Option<Arc<GenericInfo>>,
}

/// Generic family information attached to a [`TypeKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericInfo {
    family: &'static str,
    arity: usize,
    arguments: Vec<TypeKey>,
    open: bool,
}

struct OpenFamily;

/// A parameterized type that participates in open-generic bindings.
///
/// Implemented by the declaration layer for each generic service family:
///
/// ```rust
/// use ferrous_kernel::{Generic, TypeKey};
/// use std::marker::PhantomData;
///
/// struct Repository<T>(PhantomData<T>);
///
/// impl<T: 'static> Generic for Repository<T> {
///     const FAMILY: &'static str = "Repository";
///     fn type_arguments() -> Vec<TypeKey> {
///         vec![TypeKey::of::<T>()]
///     }
/// }
///
/// let key = TypeKey::of_generic::<Repository<u32>>();
/// assert_eq!(key.family(), Some("Repository"));
/// assert_eq!(key.type_arguments()[0], TypeKey::of::<u32>());
/// ```
pub trait Generic: 'static {
    /// Name of the type constructor shared by every closed form.
    const FAMILY: &'static str;

    /// The type arguments of this closed form, in declaration order.
    fn type_arguments() -> Vec<TypeKey>;
}

impl TypeKey {
    /// Key for any `'static` type, including trait objects.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            generic: None,
        }
    }

    /// Key for a closed generic type, carrying its family information.
    pub fn of_generic<T: Generic + ?Sized>() -> Self {
        let arguments = T::type_arguments();
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            generic: Some(Arc::new(GenericInfo {
                family: T::FAMILY,
                arity: arguments.len(),
                arguments,
                open: false,
            })),
        }
    }

    /// Key naming an open generic family (`family` with `arity` parameters).
    ///
    /// Open keys are only used as the service of open-generic bindings;
    /// two open keys are equal when their family and arity match.
    pub fn open(family: &'static str, arity: usize) -> Self {
        Self {
            id: TypeId::of::<OpenFamily>(),
            name: family,
            generic: Some(Arc::new(GenericInfo {
                family,
                arity,
                arguments: Vec::new(),
                open: true,
            })),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name, as reported by `std::any::type_name`.
    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn family(&self) -> Option<&'static str> {
        self.generic.as_ref().map(|g| g.family)
    }

    pub fn arity(&self) -> usize {
        self.generic.as_ref().map_or(0, |g| g.arity)
    }

    pub fn type_arguments(&self) -> &[TypeKey] {
        self.generic.as_ref().map_or(&[], |g| g.arguments.as_slice())
    }

    /// Whether this key names an open generic family rather than a type.
    pub fn is_open(&self) -> bool {
        self.generic.as_ref().is_some_and(|g| g.open)
    }

    fn open_family(&self) -> Option<(&'static str, usize)> {
        match &self.generic {
            Some(g) if g.open => Some((g.family, g.arity)),
            _ => None,
        }
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.open_family() == other.open_family()
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        if let Some(family) = self.open_family() {
            family.hash(state);
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open() {
            write!(f, "TypeKey({}<{}>)", self.name, "_,".repeat(self.arity()).trim_end_matches(','))
        } else {
            write!(f, "TypeKey({})", self.name)
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Shorthand for [`TypeKey::of`].
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> TypeKey {
    TypeKey::of::<T>()
}
