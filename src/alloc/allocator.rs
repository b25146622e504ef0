use crate::ptr::{ManagedArray, ManagedPtr};

/// A source of managed memory.
///
/// This is the only public path to a non-null [`ManagedPtr`]. Implementations
/// inside this crate do the bookkeeping every managed object must pass
/// through; outside implementations can only delegate to one of those.
///
/// Like `std::alloc::Allocator`, allocators must be shareable across threads.
pub trait ManagedAlloc: Sync {
    /// Moves `value` into managed memory and returns the first handle to it.
    ///
    /// # Errors
    /// Returns `AllocError` if the allocator refuses the allocation.
    fn alloc<T: Send + Sync + 'static>(&self, value: T) -> Result<ManagedPtr<T>, AllocError>;

    /// Allocates a managed array holding `elems`.
    ///
    /// # Errors
    /// Returns `AllocError` if the allocator refuses the allocation.
    fn alloc_array<T: Send + Sync + 'static>(
        &self,
        elems: Vec<T>,
    ) -> Result<ManagedPtr<ManagedArray<T>>, AllocError> {
        self.alloc(ManagedArray::from_vec(elems))
    }
}

/// The error type for managed allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The allocator's object ceiling was reached.
    #[error("managed heap exhausted: object limit {limit} reached")]
    Exhausted {
        /// The configured ceiling.
        limit: u64,
    },
}
