use super::Task;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A recorded task body. Replay may call it again, possibly on another thread.
pub type TaskFn = Arc<dyn Fn() + Send + Sync>;

/// A prepare-for-redo hook. Returning `false` vetoes the redo.
pub type PrepareHook = Arc<dyn Fn(&Task) -> bool + Send + Sync>;

/// What a context remembers about one task: the closure it last ran, and the
/// hooks that must approve before that closure is run again.
pub struct TaskInfo {
    function: TaskFn,
    prepare_for_redo: Mutex<Vec<PrepareHook>>,
}

impl TaskInfo {
    /// Records `function` with no hooks.
    pub fn new(function: TaskFn) -> Self {
        Self {
            function,
            prepare_for_redo: Mutex::new(Vec::new()),
        }
    }

    /// The recorded closure.
    #[inline]
    pub fn function(&self) -> &TaskFn {
        &self.function
    }

    /// Runs the recorded closure on the calling thread.
    #[inline]
    pub fn call(&self) {
        (self.function)()
    }

    /// Returns whether any hook is registered.
    pub fn needs_prepare_for_redo(&self) -> bool {
        !self.prepare_for_redo.lock().is_empty()
    }

    /// Number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.prepare_for_redo.lock().len()
    }

    /// Appends a hook; hooks run in registration order.
    pub fn on_prepare_for_redo(&self, hook: PrepareHook) {
        self.prepare_for_redo.lock().push(hook);
    }

    /// Runs every hook in order, stopping at the first that returns `false`.
    ///
    /// The hook list is snapshotted first and the lock released before any
    /// hook runs, so a hook may itself register hooks. Those take effect on the
    /// next preparation, not this one.
    pub fn prepare_for_redo(&self, task: &Task) -> bool {
        let hooks = self.prepare_for_redo.lock().clone();
        hooks.iter().all(|hook| hook(task))
    }
}

impl fmt::Debug for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInfo")
            .field("hooks", &self.hook_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ContextId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> TaskFn {
        Arc::new(|| {})
    }

    #[test]
    fn no_hooks_means_nothing_to_prepare() {
        let info = TaskInfo::new(noop());
        assert!(!info.needs_prepare_for_redo());
        assert!(info.prepare_for_redo(&Task::top_level(ContextId::GLOBAL)));
    }

    #[test]
    fn hooks_run_in_order_and_short_circuit() {
        let info = TaskInfo::new(noop());
        let trace = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for (i, verdict) in [(1, true), (2, false), (3, true)] {
            let trace = trace.clone();
            info.on_prepare_for_redo(Arc::new(move |_| {
                trace.lock().push(i);
                verdict
            }));
        }

        assert!(info.needs_prepare_for_redo());
        assert!(!info.prepare_for_redo(&Task::top_level(ContextId::GLOBAL)));
        assert_eq!(*trace.lock(), vec![1, 2]);
    }

    #[test]
    fn hook_receives_the_task_being_prepared() {
        let info = TaskInfo::new(noop());
        let expected = Task::new(ContextId::fresh(), 4);
        info.on_prepare_for_redo(Arc::new(move |t| *t == expected));
        assert!(info.prepare_for_redo(&expected));
        assert!(!info.prepare_for_redo(&Task::top_level(expected.context())));
    }

    #[test]
    fn hook_may_register_another_hook() {
        let info = Arc::new(TaskInfo::new(noop()));
        let weak = Arc::downgrade(&info);
        info.on_prepare_for_redo(Arc::new(move |_| {
            if let Some(info) = weak.upgrade() {
                info.on_prepare_for_redo(Arc::new(|_| true));
            }
            true
        }));

        assert!(info.prepare_for_redo(&Task::top_level(ContextId::GLOBAL)));
        assert_eq!(info.hook_count(), 2);
    }

    #[test]
    fn call_runs_recorded_function() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let info = TaskInfo::new(Arc::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        info.call();
        info.call();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
