//! `ManagedArray` - a fixed-length managed sequence.
//!
//! Elements live behind a reader-writer lock so a shared handle can still be
//! written through (`set`, `fill`). Handles to arrays get the same operations
//! in a null-safe form: a null array handle is an empty, zero-length sequence.

use super::ManagedPtr;
use core::fmt;
use core::iter::FusedIterator;
use parking_lot::RwLock;
use std::sync::Arc;

/// Index past the end of a managed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("index {index} out of bounds for managed array of length {len}")]
pub struct IndexOutOfBounds {
    /// The offending index.
    pub index: usize,
    /// Length of the array (`0` for a null handle).
    pub len: usize,
}

/// A fixed-length array of managed values.
pub struct ManagedArray<T> {
    len: usize,
    elems: RwLock<Box<[T]>>,
}

impl<T> ManagedArray<T> {
    /// Wraps `elems`; the array's length is fixed from here on.
    pub fn from_vec(elems: Vec<T>) -> Self {
        Self {
            len: elems.len(),
            elems: RwLock::new(elems.into_boxed_slice()),
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the array has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn check(&self, index: usize) -> Result<(), IndexOutOfBounds> {
        if index < self.len {
            Ok(())
        } else {
            Err(IndexOutOfBounds { index, len: self.len })
        }
    }
}

impl<T: Clone> ManagedArray<T> {
    /// An array of `len` copies of `value`.
    pub fn new(len: usize, value: T) -> Self {
        Self::from_vec(vec![value; len])
    }

    /// The element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<T> {
        self.elems.read().get(index).cloned()
    }

    /// The element at `index`.
    ///
    /// # Errors
    /// [`IndexOutOfBounds`] past the end.
    pub fn at(&self, index: usize) -> Result<T, IndexOutOfBounds> {
        self.check(index)?;
        Ok(self.elems.read()[index].clone())
    }

    /// Replaces the element at `index`, returning the old one.
    ///
    /// # Errors
    /// [`IndexOutOfBounds`] past the end.
    pub fn set(&self, index: usize, value: T) -> Result<T, IndexOutOfBounds> {
        self.check(index)?;
        Ok(core::mem::replace(&mut self.elems.write()[index], value))
    }

    /// Overwrites every element with `value`.
    pub fn fill(&self, value: T) {
        self.elems.write().fill(value);
    }

    /// Copies the elements out.
    pub fn to_vec(&self) -> Vec<T> {
        self.elems.read().to_vec()
    }
}

impl<T> FromIterator<T> for ManagedArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T, U> PartialEq<ManagedArray<U>> for ManagedArray<T>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &ManagedArray<U>) -> bool {
        if core::ptr::addr_eq(self, other) {
            return true;
        }
        if self.len != other.len {
            return false;
        }
        // Lock in address order so two threads comparing the same pair in
        // opposite directions cannot deadlock behind a waiting writer.
        let self_first = (self as *const Self).cast::<()>() < (other as *const ManagedArray<U>).cast::<()>();
        if self_first {
            let lhs = self.elems.read();
            let rhs = other.elems.read();
            lhs.iter().zip(rhs.iter()).all(|(a, b)| a == b)
        } else {
            let rhs = other.elems.read();
            let lhs = self.elems.read();
            lhs.iter().zip(rhs.iter()).all(|(a, b)| a == b)
        }
    }
}

impl<T: Eq> Eq for ManagedArray<T> {}

impl<T: fmt::Debug> fmt::Debug for ManagedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.elems.read().iter()).finish()
    }
}

/// Iterator over a managed array handle, yielding clones of the elements.
///
/// Holds its own share of the array, so it stays valid however long it lives.
/// Each step reads one element under the lock; concurrent writers may be
/// observed part-way through.
pub struct ArrayIter<T> {
    array: Option<Arc<ManagedArray<T>>>,
    front: usize,
    back: usize,
}

impl<T> ArrayIter<T> {
    fn new(array: Option<Arc<ManagedArray<T>>>) -> Self {
        let back = array.as_ref().map_or(0, |a| a.len());
        Self { array, front: 0, back }
    }
}

impl<T: Clone> Iterator for ArrayIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front >= self.back {
            return None;
        }
        let item = self.array.as_ref()?.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<T: Clone> DoubleEndedIterator for ArrayIter<T> {
    fn next_back(&mut self) -> Option<T> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.array.as_ref()?.get(self.back)
    }
}

impl<T: Clone> ExactSizeIterator for ArrayIter<T> {}
impl<T: Clone> FusedIterator for ArrayIter<T> {}

impl<T> ManagedPtr<ManagedArray<T>> {
    /// Number of elements; `0` for null.
    #[inline]
    pub fn len(&self) -> usize {
        self.get_ref().map_or(0, ManagedArray::len)
    }

    /// Returns whether there are no elements; `true` for null.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> ManagedPtr<ManagedArray<T>> {
    /// The element at `index`, or `None` past the end or for null.
    pub fn get(&self, index: usize) -> Option<T> {
        self.get_ref()?.get(index)
    }

    /// The element at `index`.
    ///
    /// # Errors
    /// [`IndexOutOfBounds`] past the end; a null handle has length `0`.
    pub fn at(&self, index: usize) -> Result<T, IndexOutOfBounds> {
        match self.get_ref() {
            Some(array) => array.at(index),
            None => Err(IndexOutOfBounds { index, len: 0 }),
        }
    }

    /// Replaces the element at `index`, returning the old one.
    ///
    /// # Errors
    /// [`IndexOutOfBounds`] past the end; a null handle has length `0`.
    pub fn set(&self, index: usize, value: T) -> Result<T, IndexOutOfBounds> {
        match self.get_ref() {
            Some(array) => array.set(index, value),
            None => Err(IndexOutOfBounds { index, len: 0 }),
        }
    }

    /// Overwrites every element with `value`. No-op for null.
    pub fn fill(&self, value: T) {
        if let Some(array) = self.get_ref() {
            array.fill(value);
        }
    }

    /// Iterates over clones of the elements. Empty for null.
    pub fn iter(&self) -> ArrayIter<T> {
        ArrayIter::new(self.as_shared())
    }

    /// Copies the elements out. Empty for null.
    pub fn to_vec(&self) -> Vec<T> {
        self.get_ref().map_or_else(Vec::new, ManagedArray::to_vec)
    }
}

impl<T: Clone> IntoIterator for &ManagedPtr<ManagedArray<T>> {
    type Item = T;
    type IntoIter = ArrayIter<T>;

    fn into_iter(self) -> ArrayIter<T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint<T>(elems: Vec<T>) -> ManagedPtr<ManagedArray<T>> {
        ManagedPtr::from_shared(Arc::new(ManagedArray::from_vec(elems)))
    }

    #[test]
    fn null_array_is_empty_sequence() {
        let p: ManagedPtr<ManagedArray<u32>> = ManagedPtr::null();
        assert_eq!(p.len(), 0);
        assert!(p.is_empty());
        assert_eq!(p.iter().len(), 0);
        assert!(p.iter().next().is_none());
        assert!(p.iter().next_back().is_none());
        assert_eq!(p.get(0), None);
        assert_eq!(p.at(0), Err(IndexOutOfBounds { index: 0, len: 0 }));
        assert!(p.set(0, 1).is_err());
        p.fill(9);
        assert!(p.to_vec().is_empty());
    }

    #[test]
    fn bounds_checked_access() {
        let p = mint(vec![10, 20, 30]);
        assert_eq!(p.len(), 3);
        assert_eq!(p.get(1), Some(20));
        assert_eq!(p.at(2), Ok(30));
        assert_eq!(p.at(3), Err(IndexOutOfBounds { index: 3, len: 3 }));
        assert_eq!(p.get(3), None);
    }

    #[test]
    fn writes_visible_through_every_handle() {
        let a = mint(vec![0u8; 4]);
        let b = a.clone();
        assert_eq!(a.set(1, 7), Ok(0));
        b.fill(3);
        assert_eq!(a.to_vec(), vec![3, 3, 3, 3]);
    }

    #[test]
    fn iteration_both_ends() {
        let p = mint(vec![1, 2, 3, 4]);
        let mut it = p.iter();
        assert_eq!(it.next(), Some(1));
        assert_eq!(it.next_back(), Some(4));
        assert_eq!(it.len(), 2);
        assert_eq!(it.collect::<Vec<_>>(), vec![2, 3]);

        let total: i32 = (&p).into_iter().sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn array_equality_is_elementwise() {
        let a: ManagedArray<u32> = (0..3).collect();
        let b = ManagedArray::from_vec(vec![0u32, 1, 2]);
        let c = ManagedArray::new(3, 0u32);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ManagedArray::from_vec(vec![0u32, 1]));
    }

    #[test]
    fn array_handles_follow_identity_or_value_rule() {
        let a = mint(vec![1, 2]);
        let b = mint(vec![1, 2]);
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        b.set(0, 5).unwrap();
        assert_ne!(a, b);
    }
}
