//! Type-erased instance handling.
//!
//! Every instance travelling through the kernel is an [`AnyArc`] whose
//! payload is an `Arc<T>` for some service or implementation type `T`
//! (sized or a trait object). Wrapping the typed `Arc` keeps trait objects
//! and concrete types on the same path.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::{DiError, DiResult};

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Erases a typed instance.
///
/// ```rust
/// use ferrous_kernel::instance::{erase, downcast};
/// use std::sync::Arc;
///
/// let any = erase(Arc::new(7u8));
/// assert_eq!(*downcast::<u8>(&any).unwrap(), 7);
/// assert!(downcast::<u16>(&any).is_err());
/// ```
#[inline]
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

/// Recovers the typed `Arc<T>` from an erased instance.
#[inline]
pub fn downcast<T: ?Sized + Send + Sync + 'static>(any: &AnyArc) -> DiResult<Arc<T>> {
    any.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::TypeMismatch {
            expected: std::any::type_name::<T>(),
        })
}

/// `TypeId` of the payload, i.e. `TypeId::of::<Arc<T>>()`.
#[inline]
pub fn payload_type_id(any: &AnyArc) -> TypeId {
    Any::type_id(&**any)
}

/// Whether an erased instance wraps exactly `instance`.
pub fn is_same<T: ?Sized + Send + Sync + 'static>(any: &AnyArc, instance: &Arc<T>) -> bool {
    any.downcast_ref::<Arc<T>>()
        .is_some_and(|held| Arc::ptr_eq(held, instance))
}
