//! Per-thread task establishment.
//!
//! Each thread has at most one *established* task at a time. Establishing a
//! task saves the previous one and restores it when the scope ends, whether
//! the scope returns or unwinds. A thread that never established anything is
//! running the global context's top-level task.

use super::{ContextId, Task};
use core::cell::Cell;
use core::marker::PhantomData;

thread_local! {
    static CURRENT_TASK: Cell<Option<Task>> = const { Cell::new(None) };
}

/// Scoped marker that makes a task current on this thread.
///
/// Dropping the guard restores the task that was current when it was created.
/// Guards must be dropped in reverse creation order, which ordinary lexical
/// scoping guarantees. The guard is `!Send`: it restores thread-local state
/// and means nothing on another thread.
#[must_use = "the task is only established while the guard is alive"]
pub struct Establish {
    task: Task,
    prev: Option<Task>,
    _not_send: PhantomData<*const ()>,
}

impl Establish {
    /// Makes `task` current until the returned guard is dropped.
    pub fn new(task: Task) -> Self {
        let prev = CURRENT_TASK.replace(Some(task));
        Self {
            task,
            prev,
            _not_send: PhantomData,
        }
    }

    /// The task this guard established.
    #[inline]
    pub fn task(&self) -> Task {
        self.task
    }
}

impl Drop for Establish {
    fn drop(&mut self) {
        CURRENT_TASK.set(self.prev);
    }
}

impl Task {
    /// The task currently established on this thread.
    pub fn current() -> Task {
        CURRENT_TASK
            .get()
            .unwrap_or(Task::top_level(ContextId::GLOBAL))
    }

    /// Returns whether this thread has any task explicitly established.
    pub fn is_established() -> bool {
        CURRENT_TASK.get().is_some()
    }

    /// Runs `f` with `self` established, restoring the previous task afterwards.
    pub fn establish_and_run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = Establish::new(*self);
        f()
    }
}
