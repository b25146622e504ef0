//! `ManagedPtr` - a nullable, shared-ownership handle into managed memory.
//!
//! A `ManagedPtr<T>` behaves like an `Option<Arc<T>>` with three differences
//! that matter to code built on it:
//!
//! - **Restricted construction.** There is no public constructor from a value,
//!   a raw pointer, or an `Arc`. Non-null handles are minted only by a
//!   [`ManagedAlloc`](crate::alloc::ManagedAlloc) implementation, so every live
//!   handle has passed through managed-memory bookkeeping.
//! - **Identity-first equality.** Two handles are equal if they point at the
//!   same allocation, *or* if both are non-null and their contents compare
//!   equal. Equal handles are therefore not necessarily the same object; use
//!   [`ManagedPtr::ptr_eq`] when identity is what you mean.
//! - **Explicit casts.** Base/derived relationships are expressed with trait
//!   objects. [`static_cast`](ManagedPtr::static_cast) performs a checked
//!   coercion, [`dynamic_cast`](ManagedPtr::dynamic_cast) a runtime downcast
//!   that yields null on mismatch. All casts share ownership with the source.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::sync::Arc;

/// Managed arrays and their null-safe handle operations.
pub mod array;
/// Runtime-checked casting support.
pub mod cast;

pub use array::{ArrayIter, IndexOutOfBounds, ManagedArray};
pub use cast::ManagedObject;

/// The null handle literal.
///
/// `ptr == Null` holds exactly when `ptr` is null. No value comparison is
/// involved: null has no contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Null;

/// A nullable, reference-counted handle to a managed object.
pub struct ManagedPtr<T: ?Sized> {
    ptr: Option<Arc<T>>,
}

impl<T: ?Sized> ManagedPtr<T> {
    /// The null handle.
    #[inline]
    pub const fn null() -> Self {
        Self { ptr: None }
    }

    /// Wraps an existing shared handle. Reserved for the managed allocator
    /// and for casts, which only ever re-wrap handles that were minted there.
    #[inline]
    pub(crate) fn from_shared(ptr: Arc<T>) -> Self {
        Self { ptr: Some(ptr) }
    }

    #[inline]
    pub(crate) fn from_option(ptr: Option<Arc<T>>) -> Self {
        Self { ptr }
    }

    /// Returns the underlying shared handle, if non-null.
    #[inline]
    pub fn as_shared(&self) -> Option<Arc<T>> {
        self.ptr.clone()
    }

    /// Returns whether the handle is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Returns whether the handle is non-null.
    #[inline]
    pub fn is_some(&self) -> bool {
        self.ptr.is_some()
    }

    /// Borrows the referent, or `None` for a null handle.
    #[inline]
    pub fn get_ref(&self) -> Option<&T> {
        self.ptr.as_deref()
    }

    /// Address of the allocation, used as the handle's identity.
    #[inline]
    fn identity(&self) -> Option<*const ()> {
        self.ptr.as_ref().map(|p| Arc::as_ptr(p).cast::<()>())
    }

    /// Returns whether both handles share the same identity.
    ///
    /// Two null handles share the (absent) identity. Works across pointee
    /// types, so a handle and its upcast compare identical.
    #[inline]
    pub fn ptr_eq<U: ?Sized>(&self, other: &ManagedPtr<U>) -> bool {
        self.identity() == other.identity()
    }

    /// Number of handles sharing this referent, `0` for null.
    #[inline]
    pub fn strong_count(&self) -> usize {
        self.ptr.as_ref().map_or(0, Arc::strong_count)
    }

    /// Exchanges the referents of two handles.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Takes the referent out, leaving null behind.
    #[inline]
    pub fn take(&mut self) -> Self {
        Self { ptr: self.ptr.take() }
    }

    /// Releases this handle's share, leaving null behind.
    #[inline]
    pub fn reset(&mut self) {
        self.ptr = None;
    }

    /// Re-types the handle through a compile-time checked conversion.
    ///
    /// The closure receives the shared handle and returns it re-typed,
    /// usually by unsizing:
    ///
    /// ```rust
    /// use isoctx::alloc::{ManagedAlloc, ManagedHeap};
    /// use isoctx::ManagedPtr;
    /// use std::fmt::Display;
    /// use std::sync::Arc;
    ///
    /// let heap = ManagedHeap::new();
    /// let n = heap.alloc(7u32).unwrap();
    /// let shown: ManagedPtr<dyn Display + Send + Sync> =
    ///     n.static_cast(|p| p as Arc<dyn Display + Send + Sync>);
    /// assert!(shown.ptr_eq(&n));
    /// assert_eq!(format!("{}", &*shown), "7");
    /// ```
    ///
    /// A null handle stays null and the closure is not called.
    ///
    /// The result always shares ownership with `self`. A closure that returns
    /// any other allocation yields null instead, and the `Arc` it built is
    /// dropped: a cast never mints a handle the allocator did not.
    pub fn static_cast<U: ?Sized>(&self, cast: impl FnOnce(Arc<T>) -> Arc<U>) -> ManagedPtr<U> {
        let Some(src) = &self.ptr else {
            return ManagedPtr::null();
        };
        let out = cast(Arc::clone(src));
        if core::ptr::addr_eq(Arc::as_ptr(src), Arc::as_ptr(&out)) {
            ManagedPtr::from_shared(out)
        } else {
            tracing::warn!(source = %self, "static_cast returned a foreign allocation; result is null");
            ManagedPtr::null()
        }
    }

    /// The const-cast variant.
    ///
    /// Managed handles are never const-qualified (mutation always goes
    /// through the pointee's interior mutability), so this is the identity
    /// cast: a new handle sharing ownership with `self`.
    #[inline]
    pub fn const_cast(&self) -> ManagedPtr<T> {
        self.clone()
    }
}

impl<T: ?Sized> Clone for ManagedPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self { ptr: self.ptr.clone() }
    }
}

impl<T: ?Sized> Default for ManagedPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Null> for ManagedPtr<T> {
    #[inline]
    fn from(_: Null) -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for ManagedPtr<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is null.
    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match &self.ptr {
            Some(p) => &**p,
            None => null_deref(),
        }
    }
}

#[cold]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced a null ManagedPtr")
}

impl<T, U> PartialEq<ManagedPtr<U>> for ManagedPtr<T>
where
    T: ?Sized + PartialEq<U>,
    U: ?Sized,
{
    fn eq(&self, other: &ManagedPtr<U>) -> bool {
        match (&self.ptr, &other.ptr) {
            (None, None) => true,
            (Some(a), Some(b)) => self.ptr_eq(other) || **a == **b,
            _ => false,
        }
    }
}

impl<T: ?Sized + Eq> Eq for ManagedPtr<T> {}

impl<T: ?Sized> PartialEq<Null> for ManagedPtr<T> {
    #[inline]
    fn eq(&self, _: &Null) -> bool {
        self.is_null()
    }
}

impl<T: ?Sized> PartialEq<ManagedPtr<T>> for Null {
    #[inline]
    fn eq(&self, other: &ManagedPtr<T>) -> bool {
        other.is_null()
    }
}

// Equal handles either share a referent or have equal contents, so hashing
// the contents keeps `Hash` consistent with `Eq`.
impl<T: ?Sized + Hash> Hash for ManagedPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.ptr {
            None => state.write_u8(0),
            Some(p) => {
                state.write_u8(1);
                (**p).hash(state);
            }
        }
    }
}

impl<T: ?Sized> fmt::Pointer for ManagedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ptr {
            Some(p) => fmt::Pointer::fmt(&Arc::as_ptr(p), f),
            None => f.write_str("0x0"),
        }
    }
}

/// Renders the referent's address, like printing the shared handle itself.
impl<T: ?Sized> fmt::Display for ManagedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(self, f)
    }
}

impl<T: ?Sized> fmt::Debug for ManagedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ManagedPtr")
            .field(&format_args!("{self}"))
            .finish()
    }
}
