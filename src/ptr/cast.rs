use super::ManagedPtr;
use core::any::Any;
use std::sync::Arc;

/// Types whose managed handles support runtime-checked downcasts.
///
/// Implemented for every sized `Any + Send + Sync` type. A record hierarchy
/// declares its base as a trait with `ManagedObject` as a supertrait; handles
/// to `dyn Base` then gain [`ManagedPtr::dynamic_cast`].
///
/// ```rust
/// use isoctx::alloc::{ManagedAlloc, ManagedHeap};
/// use isoctx::{ManagedObject, ManagedPtr};
/// use std::sync::Arc;
///
/// trait Record: ManagedObject {}
/// struct Product(u32);
/// struct Report;
/// impl Record for Product {}
/// impl Record for Report {}
///
/// let heap = ManagedHeap::new();
/// let base: ManagedPtr<dyn Record> = heap
///     .alloc(Product(3))
///     .unwrap()
///     .static_cast(|p| p as Arc<dyn Record>);
///
/// assert_eq!(base.dynamic_cast::<Product>().0, 3);
/// assert!(base.dynamic_cast::<Report>().is_null());
/// ```
pub trait ManagedObject: Any + Send + Sync {
    /// Erases the concrete type, keeping the same allocation.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> ManagedObject for T {
    #[inline]
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ManagedObject for dyn Any + Send + Sync {
    #[inline]
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T: ManagedObject + ?Sized> ManagedPtr<T> {
    /// Downcasts to the concrete type `U`.
    ///
    /// Returns a handle sharing ownership with `self` when the referent is a
    /// `U`, and null when it is not or when `self` is null. Never panics.
    ///
    /// `U` must be the concrete type. To reach another trait object, downcast
    /// first and then [`static_cast`](ManagedPtr::static_cast) the result.
    pub fn dynamic_cast<U: Any + Send + Sync>(&self) -> ManagedPtr<U> {
        let downcast = self
            .as_shared()
            .and_then(|p| p.into_any().downcast::<U>().ok());
        ManagedPtr::from_option(downcast)
    }

    /// Returns whether the referent is a `U`. Null is never a `U`.
    pub fn is<U: Any>(&self) -> bool {
        self.as_shared().is_some_and(|p| p.into_any().is::<U>())
    }

    /// Upcasts to the type-erased base every managed object shares.
    pub fn erase(&self) -> ManagedPtr<dyn Any + Send + Sync> {
        ManagedPtr::from_option(self.as_shared().map(ManagedObject::into_any))
    }
}
