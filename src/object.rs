//! Object handles stored by the registry
//!
//! The registry never looks inside the objects it manages. Everything is kept
//! as a type-erased `Arc<dyn Any + Send + Sync>` and identity is pointer
//! identity of that `Arc`.

use std::any::Any;
use std::sync::Arc;

/// Type-erased shared handle to a managed object
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// Marker trait for types that can be stored in the registry.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
///
/// # Examples
///
/// ```rust
/// use singleton_registry::{object_ref, Injectable};
///
/// struct Database {
///     url: String,
/// }
///
/// let db = object_ref(Database { url: "postgres://localhost".into() });
/// assert!(db.downcast_ref::<Database>().is_some());
/// ```
pub trait Injectable: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Wrap a value into an [`ObjectRef`]
#[inline]
pub fn object_ref<T: Injectable>(value: T) -> ObjectRef {
    Arc::new(value) as ObjectRef
}

/// Downcast an [`ObjectRef`] to a concrete `Arc<T>`.
///
/// Returns `None` if the object is not a `T`.
#[inline]
pub fn downcast<T: Injectable>(object: ObjectRef) -> Option<Arc<T>> {
    object.downcast::<T>().ok()
}

/// Whether two handles point at the same object
#[inline]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    Arc::ptr_eq(a, b)
}
