//! # `isoctx` - Managed Pointers and Isolated Task Redo
//!
//! Building blocks for running work inside an *isolation context* and later
//! merging it into the parent by *redoing* it there.
//!
//! ## Key Features
//!
//! - **Managed pointers**: [`ManagedPtr<T>`] is a nullable shared handle whose
//!   non-null values only come from a managed allocator, with identity-first
//!   equality and explicit static/dynamic casts.
//! - **Managed arrays**: [`ManagedArray<T>`] with null-safe, bounds-checked access
//!   through its handle.
//! - **Task registry**: every task run through
//!   [`ContextRegistry::remember_and_call`] has its body recorded, together with
//!   any prepare-for-redo hooks registered while it ran.
//! - **Publish resolution**: [`ContextRegistry::resolve`] validates a whole
//!   publication (every task recorded, every hook approves) before replaying a
//!   single task, then replays in original start order.
//!
//! ## Architecture
//!
//! ```text
//! ptr ◄── alloc            (handles, arrays, the heap that mints them)
//! task ◄── registry ◄── resolve ◄── context
//!   │         │             │           └── IsoContext, Publication
//!   │         │             └── PublishResult, ResolveError, resolve()
//!   │         └── TaskInfoRegistry, ContextRegistry
//!   └── ContextId, Task, StartStamp, Establish, TaskInfo
//! ```
//!
//! ### Guarantees
//!
//! **All-or-nothing validation**: if `resolve` returns `Err`, no task body was
//! replayed.
//!
//! **Order preservation**: on success, each task body runs exactly once, under
//! its own task, in non-decreasing start-time order.
//!
//! **Scoped establishment**: the thread's current task after any
//! `establish_and_run`, `remember_and_call`, or `resolve` is what it was
//! before, even when the body unwinds.
//!
//! ## Example
//!
//! ```rust
//! use isoctx::{ContextRegistry, IsoContext, NoReports, ResolveError, Task};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let registry = ContextRegistry::new();
//! let child = IsoContext::root().new_child();
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let r = runs.clone();
//! let task = child.run(&registry, move || {
//!     r.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! // A hook that refuses the redo keeps the body from running again.
//! registry.on_prepare_for_redo(task, |_| false);
//! let err = registry.resolve(&child.publish(), &NoReports).unwrap_err();
//! assert!(matches!(err, ResolveError::TaskPrepareRejected(t) if t == task));
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod alloc;
pub mod context;
pub mod ptr;
pub mod registry;
pub mod resolve;
pub mod task;

pub use alloc::{AllocError, HeapConfig, HeapStats, ManagedAlloc, ManagedHeap};
pub use context::{IsoContext, Publication};
pub use ptr::{ArrayIter, IndexOutOfBounds, ManagedArray, ManagedObject, ManagedPtr, Null};
pub use registry::{ContextRegistry, TaskInfoRegistry};
pub use resolve::{
    ErrorKind, NoReports, PublishResult, ResolveError, ResolveReporter, ResolveSummary, TracingReporter,
};
pub use task::{ContextId, Establish, PrepareHook, StartStamp, Task, TaskFn, TaskInfo};

// Compile-time assertions for memory layout
const _: () = {
    use core::mem;
    use std::sync::Arc;

    // A handle is a nullable `Arc`: the null niche keeps it pointer-sized.
    assert!(mem::size_of::<ManagedPtr<u64>>() == mem::size_of::<Arc<u64>>());
    assert!(mem::size_of::<ManagedPtr<dyn core::any::Any + Send + Sync>>() == mem::size_of::<usize>() * 2);

    // Task identity is plain data, cheap to copy through thread-locals.
    assert!(mem::size_of::<Task>() == mem::size_of::<u64>() * 2);
    assert!(mem::size_of::<ContextId>() == mem::size_of::<u64>());
};
