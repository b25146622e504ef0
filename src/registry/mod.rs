//! Task and context registries.
//!
//! [`TaskInfoRegistry`] maps each task of one context to what it last ran.
//! [`ContextRegistry`] maps context ids to their task registries and is the
//! service object through which tasks are recorded and later resolved.
//!
//! Both maps are guarded by a single mutex each. Only the map access itself
//! happens under the lock; what comes out is an `Arc`, so callers keep using
//! it after the lock is gone and task code never runs while a registry lock
//! is held.

use crate::task::{ContextId, PrepareHook, Task, TaskFn, TaskInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Per-context map from task to its recorded [`TaskInfo`].
#[derive(Debug, Default)]
pub struct TaskInfoRegistry {
    map: Mutex<HashMap<Task, Arc<TaskInfo>>>,
}

impl TaskInfoRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the info recorded for `task`, if any.
    pub fn lookup(&self, task: &Task) -> Option<Arc<TaskInfo>> {
        self.map.lock().get(task).cloned()
    }

    /// Records `info` for `task`, returning whatever it replaced.
    pub fn insert(&self, task: Task, info: Arc<TaskInfo>) -> Option<Arc<TaskInfo>> {
        self.map.lock().insert(task, info)
    }

    /// Forgets `task`.
    pub fn remove(&self, task: &Task) -> Option<Arc<TaskInfo>> {
        self.map.lock().remove(task)
    }

    /// Number of recorded tasks.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Returns whether no task is recorded.
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Snapshot of the recorded tasks, in no particular order.
    pub fn tasks(&self) -> Vec<Task> {
        self.map.lock().keys().copied().collect()
    }
}

/// Process-wide (or explicitly scoped) map from context to [`TaskInfoRegistry`].
///
/// Most programs use [`ContextRegistry::global`]; tests and embedders that
/// want isolation construct their own and pass it around by reference.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    map: Mutex<HashMap<ContextId, Arc<TaskInfoRegistry>>>,
}

impl ContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default registry.
    pub fn global() -> &'static ContextRegistry {
        static GLOBAL: OnceLock<ContextRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ContextRegistry::new)
    }

    /// Returns `ctx`'s task registry, creating it on first use.
    pub fn get(&self, ctx: ContextId) -> Arc<TaskInfoRegistry> {
        let mut map = self.map.lock();
        map.entry(ctx)
            .or_insert_with(|| {
                tracing::debug!(context = %ctx, "created task registry");
                Arc::new(TaskInfoRegistry::new())
            })
            .clone()
    }

    /// Returns `ctx`'s task registry if one exists. Never creates.
    pub fn lookup(&self, ctx: ContextId) -> Option<Arc<TaskInfoRegistry>> {
        self.map.lock().get(&ctx).cloned()
    }

    /// Drops `ctx`'s registry, returning it. Used by the context layer on teardown.
    pub fn release(&self, ctx: ContextId) -> Option<Arc<TaskInfoRegistry>> {
        let released = self.map.lock().remove(&ctx);
        if released.is_some() {
            tracing::debug!(context = %ctx, "released task registry");
        }
        released
    }

    /// Number of contexts with a registry.
    pub fn contexts(&self) -> usize {
        self.map.lock().len()
    }

    /// Returns the info recorded for `task` in its own context, if any.
    pub fn lookup_info(&self, task: &Task) -> Option<Arc<TaskInfo>> {
        self.lookup(task.context())?.lookup(task)
    }

    /// Records `f` as `task`'s body, then runs it with `task` established.
    ///
    /// Running the same task again replaces the recorded body together with
    /// any hooks registered against the earlier run.
    pub fn remember_and_call<F>(&self, task: Task, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let function: TaskFn = Arc::new(f);
        let info = Arc::new(TaskInfo::new(function));
        let replaced = self.get(task.context()).insert(task, info.clone());
        tracing::debug!(%task, rerun = replaced.is_some(), "recorded task body");

        task.establish_and_run(|| info.call());
    }

    /// [`remember_and_call`](Self::remember_and_call) for the task currently
    /// established on this thread.
    pub fn remember_and_call_current<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.remember_and_call(Task::current(), f);
    }

    /// Registers a prepare-for-redo hook on `task`.
    ///
    /// If `task` was never run through [`remember_and_call`](Self::remember_and_call)
    /// there is nothing to redo, and the hook is dropped. Returns whether it
    /// was stored.
    pub fn on_prepare_for_redo<F>(&self, task: Task, hook: F) -> bool
    where
        F: Fn(&Task) -> bool + Send + Sync + 'static,
    {
        let Some(info) = self.lookup_info(&task) else {
            tracing::debug!(%task, "ignored prepare-for-redo hook for unrecorded task");
            return false;
        };
        let hook: PrepareHook = Arc::new(hook);
        info.on_prepare_for_redo(hook);
        tracing::debug!(%task, hooks = info.hook_count(), "registered prepare-for-redo hook");
        true
    }

    /// [`on_prepare_for_redo`](Self::on_prepare_for_redo) for the current task.
    pub fn on_prepare_for_redo_current<F>(&self, hook: F) -> bool
    where
        F: Fn(&Task) -> bool + Send + Sync + 'static,
    {
        self.on_prepare_for_redo(Task::current(), hook)
    }
}
