//! Managed memory: the allocator trait and the default heap.
//!
//! Every non-null [`ManagedPtr`](crate::ManagedPtr) starts life here.

pub mod allocator;
pub mod heap;

pub use allocator::{AllocError, ManagedAlloc};
pub use heap::{HeapConfig, HeapStats, ManagedHeap};
