//! Isolation contexts and the publications they produce.
//!
//! An [`IsoContext`] is a scope of isolated work. Tasks started in it get a
//! serial and a start stamp; when the work is done, [`IsoContext::publish`]
//! packages the started tasks into a [`Publication`] that a
//! [`ContextRegistry`] can resolve into the parent.
//!
//! ```rust
//! use isoctx::{ContextRegistry, IsoContext, NoReports, Task};
//! use std::sync::{Arc, Mutex};
//!
//! let registry = ContextRegistry::new();
//! let parent = IsoContext::root();
//! let child = parent.new_child();
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! for n in 0..3 {
//!     let seen = seen.clone();
//!     child.run(&registry, move || seen.lock().unwrap().push((n, Task::current())));
//! }
//! seen.lock().unwrap().clear();
//!
//! let summary = registry.resolve(&child.publish(), &NoReports).unwrap();
//! assert_eq!(summary.tasks_replayed, 3);
//! assert_eq!(summary.target, Some(parent.id()));
//! assert_eq!(seen.lock().unwrap().len(), 3);
//! ```

use crate::registry::ContextRegistry;
use crate::resolve::PublishResult;
use crate::task::{ContextId, StartStamp, Task};
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

struct ContextInner {
    id: ContextId,
    parent: Option<IsoContext>,
    next_serial: AtomicU64,
    started: Mutex<Vec<(StartStamp, Task)>>,
}

/// Handle to an isolation context. Clones share the context.
#[derive(Clone)]
pub struct IsoContext {
    inner: Arc<ContextInner>,
}

impl IsoContext {
    fn with_parent(id: ContextId, parent: Option<IsoContext>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id,
                parent,
                next_serial: AtomicU64::new(Task::TOP_LEVEL_SERIAL + 1),
                started: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A fresh context with no parent.
    pub fn root() -> Self {
        Self::with_parent(ContextId::fresh(), None)
    }

    /// The global context every thread starts in.
    pub fn global() -> &'static IsoContext {
        static GLOBAL: OnceLock<IsoContext> = OnceLock::new();
        GLOBAL.get_or_init(|| IsoContext::with_parent(ContextId::GLOBAL, None))
    }

    /// A fresh context whose work publishes into `self`.
    pub fn new_child(&self) -> Self {
        Self::with_parent(ContextId::fresh(), Some(self.clone()))
    }

    /// This context's id.
    #[inline]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// The context this one publishes into, if any.
    pub fn parent(&self) -> Option<&IsoContext> {
        self.inner.parent.as_ref()
    }

    /// The privileged task for this context's root scope.
    #[inline]
    pub fn top_level_task(&self) -> Task {
        Task::top_level(self.id())
    }

    /// Mints a new task in this context and records when it started.
    pub fn start_task(&self) -> Task {
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let task = Task::new(self.id(), serial);
        self.inner.started.lock().push((StartStamp::now(), task));
        task
    }

    /// Starts a task and runs `f` as its recorded body.
    pub fn run<F>(&self, registry: &ContextRegistry, f: F) -> Task
    where
        F: Fn() + Send + Sync + 'static,
    {
        let task = self.start_task();
        registry.remember_and_call(task, f);
        task
    }

    /// Every task started so far, earliest first.
    pub fn started_tasks(&self) -> Vec<Task> {
        let mut started = self.inner.started.lock().clone();
        started.sort_unstable_by_key(|&(stamp, _)| stamp);
        started.into_iter().map(|(_, task)| task).collect()
    }

    /// Packages this context's started tasks for resolution into the parent.
    pub fn publish(&self) -> Publication {
        let mut publication = Publication::new(self.id(), self.parent().map(IsoContext::id));
        publication
            .records
            .extend(self.inner.started.lock().iter().copied());
        publication
    }
}

impl PartialEq for IsoContext {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for IsoContext {}

impl fmt::Debug for IsoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsoContext")
            .field("id", &self.id())
            .field("parent", &self.parent().map(IsoContext::id))
            .field("started", &self.inner.started.lock().len())
            .finish()
    }
}

type GlobalPrepare = Box<dyn Fn() -> anyhow::Result<bool> + Send + Sync>;

/// A concrete [`PublishResult`]: the recorded tasks of one context.
pub struct Publication {
    source: ContextId,
    target: Option<ContextId>,
    records: Vec<(StartStamp, Task)>,
    prepare: Option<GlobalPrepare>,
}

impl Publication {
    /// An empty publication from `source` into `target`.
    pub fn new(source: ContextId, target: Option<ContextId>) -> Self {
        Self {
            source,
            target,
            records: Vec::new(),
            prepare: None,
        }
    }

    /// Adds a task that started at `stamp`.
    #[must_use]
    pub fn with_task(mut self, stamp: StartStamp, task: Task) -> Self {
        self.records.push((stamp, task));
        self
    }

    /// Installs the publication-wide prepare-for-redo step.
    #[must_use]
    pub fn with_prepare<F>(mut self, prepare: F) -> Self
    where
        F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.prepare = Some(Box::new(prepare));
        self
    }

    /// Number of tasks carried.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether no tasks are carried.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PublishResult for Publication {
    fn source_context(&self) -> ContextId {
        self.source
    }

    fn target_context(&self) -> Option<ContextId> {
        self.target
    }

    fn redo_tasks_by_start_time(&self) -> Vec<Task> {
        let mut records = self.records.clone();
        // Stable, so equal stamps keep insertion order.
        records.sort_by_key(|&(stamp, _)| stamp);
        records.into_iter().map(|(_, task)| task).collect()
    }

    fn prepare_for_redo(&self) -> anyhow::Result<bool> {
        self.prepare.as_ref().map_or(Ok(true), |prepare| prepare())
    }
}

impl fmt::Debug for Publication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publication")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("tasks", &self.records.len())
            .field("prepare", &self.prepare.is_some())
            .finish()
    }
}
