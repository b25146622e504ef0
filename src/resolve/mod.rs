//! Publish resolution: validate a child context's recorded work, then redo it.
//!
//! Resolution runs in two halves. The first half only *looks*: every task
//! must have a recorded body, every prepare-for-redo hook must approve, and
//! the publication's own prepare step must approve. Only when all of that has
//! passed does the second half replay the recorded bodies, one at a time, in
//! the order the tasks originally started.
//!
//! ```text
//! no tasks ───────────────────────────────────────────────► Ok
//! tasks ─► lookup registry ─► lookup every task ─► task hooks ─► publication hook ─► replay ─► Ok
//!               │                   │                  │               │
//!               └── Err ◄───────────┴──────────────────┴───────────────┘   (nothing replayed)
//! ```

use crate::registry::ContextRegistry;
use crate::task::{ContextId, Task, TaskInfo};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

mod error;

pub use error::{ErrorKind, ResolveError};

/// A finished isolated computation waiting to be merged into its parent.
pub trait PublishResult {
    /// The context whose tasks are to be redone.
    fn source_context(&self) -> ContextId;

    /// The context the work is merged into, when known.
    fn target_context(&self) -> Option<ContextId> {
        None
    }

    /// The tasks to redo, ordered by the time they originally started.
    fn redo_tasks_by_start_time(&self) -> Vec<Task>;

    /// The publication's own veto, consulted after every task hook approved.
    ///
    /// # Errors
    /// An `Err` is a failure of the hook itself, not a veto, and is reported
    /// as [`ResolveError::PrepareHook`].
    fn prepare_for_redo(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// The task under which per-task hooks run: the target context's root
    /// scope, or the source's when no target is named. Hook code never runs
    /// as one of the tasks being redone.
    fn prepare_scope(&self) -> Task {
        Task::top_level(self.target_context().unwrap_or_else(|| self.source_context()))
    }
}

/// Observer notified before a non-trivial resolution starts.
///
/// Reporters see the publication but cannot change the outcome.
pub trait ResolveReporter {
    /// Called once, after the no-op fast path and before any lookup.
    fn before_resolve(&self, publication: &dyn PublishResult);
}

/// A reporter that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReports;

impl ResolveReporter for NoReports {
    fn before_resolve(&self, _publication: &dyn PublishResult) {}
}

/// A reporter that emits an `info` event per resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ResolveReporter for TracingReporter {
    fn before_resolve(&self, publication: &dyn PublishResult) {
        tracing::info!(
            source = %publication.source_context(),
            target = ?publication.target_context(),
            "resolving publication"
        );
    }
}

impl<F: Fn(&dyn PublishResult)> ResolveReporter for F {
    fn before_resolve(&self, publication: &dyn PublishResult) {
        self(publication)
    }
}

/// What a successful resolution did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveSummary {
    /// The context whose work was redone.
    pub source: ContextId,
    /// The context it was merged into, if the publication named one.
    pub target: Option<ContextId>,
    /// Number of task bodies replayed.
    pub tasks_replayed: usize,
    /// Whether a per-task preparation phase ran.
    pub prepared: bool,
}

impl ContextRegistry {
    /// Validates and redoes `publication`'s tasks.
    ///
    /// On `Err`, no task body has been replayed. On `Ok`, every task body has
    /// been replayed exactly once, under its own task, in start-time order.
    ///
    /// If a replayed body panics, the panic propagates after being logged.
    /// Bodies already replayed stay replayed: the target context is left
    /// partially redone and the caller owns the recovery.
    ///
    /// # Errors
    /// See [`ResolveError`].
    pub fn resolve(
        &self,
        publication: &dyn PublishResult,
        reports: &dyn ResolveReporter,
    ) -> Result<ResolveSummary, ResolveError> {
        let source = publication.source_context();
        let mut summary = ResolveSummary {
            source,
            target: publication.target_context(),
            tasks_replayed: 0,
            prepared: false,
        };

        let tasks = publication.redo_tasks_by_start_time();
        if tasks.is_empty() {
            tracing::debug!(%source, "nothing to redo");
            return Ok(summary);
        }
        reports.before_resolve(publication);

        let infos = self.collect_infos(source, tasks)?;

        if infos.iter().any(|(_, info)| info.needs_prepare_for_redo()) {
            let scope = publication.prepare_scope();
            let rejected = scope.establish_and_run(|| {
                infos
                    .iter()
                    .find(|entry| !entry.1.prepare_for_redo(&entry.0))
                    .map(|entry| entry.0)
            });
            if let Some(task) = rejected {
                tracing::warn!(%source, %task, "resolve aborted: task hook rejected redo");
                return Err(ResolveError::TaskPrepareRejected(task));
            }
            summary.prepared = true;
        }

        match publication.prepare_for_redo() {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(%source, "resolve aborted: publication rejected redo");
                return Err(ResolveError::GlobalPrepareRejected(source));
            }
            Err(err) => {
                tracing::warn!(%source, error = %err, "resolve aborted: publication prepare failed");
                return Err(ResolveError::PrepareHook(err));
            }
        }

        // Sequential, on this thread, in start order. Running independent
        // tasks concurrently needs dependency tracking we do not have.
        for (task, info) in &infos {
            tracing::debug!(%source, %task, "replaying task");
            let replay = panic::catch_unwind(AssertUnwindSafe(|| {
                task.establish_and_run(|| info.call());
            }));
            if let Err(payload) = replay {
                tracing::error!(
                    %source,
                    %task,
                    replayed = summary.tasks_replayed,
                    remaining = infos.len() - summary.tasks_replayed,
                    "task replay panicked; context left partially redone"
                );
                panic::resume_unwind(payload);
            }
            summary.tasks_replayed += 1;
        }

        Ok(summary)
    }

    /// Looks up every task's info, failing on the first miss.
    fn collect_infos(
        &self,
        source: ContextId,
        tasks: Vec<Task>,
    ) -> Result<Vec<(Task, Arc<TaskInfo>)>, ResolveError> {
        let Some(registry) = self.lookup(source) else {
            tracing::warn!(%source, "resolve aborted: context has no task registry");
            return Err(ResolveError::ContextNotRegistered(source));
        };

        tasks
            .into_iter()
            .map(|task| match registry.lookup(&task) {
                Some(info) => Ok((task, info)),
                None => {
                    tracing::warn!(%source, %task, "resolve aborted: task was never recorded");
                    Err(ResolveError::TaskNotRegistered(task))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Fixed {
        source: ContextId,
        tasks: Vec<Task>,
        verdict: fn() -> anyhow::Result<bool>,
    }

    impl PublishResult for Fixed {
        fn source_context(&self) -> ContextId {
            self.source
        }
        fn redo_tasks_by_start_time(&self) -> Vec<Task> {
            self.tasks.clone()
        }
        fn prepare_for_redo(&self) -> anyhow::Result<bool> {
            (self.verdict)()
        }
    }

    fn approve() -> anyhow::Result<bool> {
        Ok(true)
    }

    fn record(reg: &ContextRegistry, task: Task, log: &Arc<Mutex<Vec<Task>>>) {
        let log = log.clone();
        reg.remember_and_call(task, move || log.lock().push(Task::current()));
    }

    #[test]
    fn empty_publication_is_noop_and_skips_reporter() {
        let reg = ContextRegistry::new();
        let called = Mutex::new(false);
        let reporter = |_: &dyn PublishResult| *called.lock() = true;
        let publication = Fixed { source: ContextId::fresh(), tasks: vec![], verdict: approve };

        let summary = reg.resolve(&publication, &reporter).unwrap();
        assert_eq!(summary.tasks_replayed, 0);
        assert!(!*called.lock());
    }

    #[test]
    fn replays_under_each_task_in_given_order() {
        let reg = ContextRegistry::new();
        let ctx = ContextId::fresh();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Task::new(ctx, 1), Task::new(ctx, 2));
        record(&reg, b, &log);
        record(&reg, a, &log);
        log.lock().clear();

        let publication = Fixed { source: ctx, tasks: vec![a, b], verdict: approve };
        let summary = reg.resolve(&publication, &NoReports).unwrap();

        assert_eq!(*log.lock(), vec![a, b]);
        assert_eq!(summary.tasks_replayed, 2);
        assert!(!summary.prepared);
    }

    #[test]
    fn missing_task_aborts_before_replay() {
        let reg = ContextRegistry::new();
        let ctx = ContextId::fresh();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Task::new(ctx, 1);
        record(&reg, a, &log);
        log.lock().clear();

        let missing = Task::new(ctx, 2);
        let publication = Fixed { source: ctx, tasks: vec![a, missing], verdict: approve };
        let err = reg.resolve(&publication, &NoReports).unwrap_err();

        assert!(matches!(err, ResolveError::TaskNotRegistered(t) if t == missing));
        assert_eq!(err.kind(), ErrorKind::RegistryMiss);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn hooks_run_under_prepare_scope() {
        let reg = ContextRegistry::new();
        let ctx = ContextId::fresh();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Task::new(ctx, 1);
        record(&reg, a, &log);

        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        reg.on_prepare_for_redo(a, move |_| {
            *s.lock() = Some(Task::current());
            true
        });

        let publication = Fixed { source: ctx, tasks: vec![a], verdict: approve };
        let summary = reg.resolve(&publication, &NoReports).unwrap();
        assert!(summary.prepared);
        assert_eq!(*seen.lock(), Some(Task::top_level(ctx)));
    }

    #[test]
    fn global_veto_and_global_error_are_distinguished() {
        let reg = ContextRegistry::new();
        let ctx = ContextId::fresh();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Task::new(ctx, 1);
        record(&reg, a, &log);
        log.lock().clear();

        let veto = Fixed { source: ctx, tasks: vec![a], verdict: || Ok(false) };
        let err = reg.resolve(&veto, &NoReports).unwrap_err();
        assert!(matches!(err, ResolveError::GlobalPrepareRejected(c) if c == ctx));
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);

        let broken = Fixed { source: ctx, tasks: vec![a], verdict: || Err(anyhow::anyhow!("store offline")) };
        let err = reg.resolve(&broken, &NoReports).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HookError);
        assert_eq!(std::error::Error::source(&err).map(ToString::to_string), Some("store offline".into()));

        assert!(log.lock().is_empty());
    }

    struct Counted {
        inner: Fixed,
        listed: std::sync::atomic::AtomicUsize,
    }

    impl PublishResult for Counted {
        fn source_context(&self) -> ContextId {
            self.inner.source_context()
        }
        fn redo_tasks_by_start_time(&self) -> Vec<Task> {
            self.listed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.redo_tasks_by_start_time()
        }
    }

    #[test]
    fn tracing_reporter_does_not_relist_tasks() {
        let reg = ContextRegistry::new();
        let ctx = ContextId::fresh();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Task::new(ctx, 1);
        record(&reg, a, &log);

        let publication = Counted {
            inner: Fixed { source: ctx, tasks: vec![a], verdict: approve },
            listed: std::sync::atomic::AtomicUsize::new(0),
        };
        reg.resolve(&publication, &TracingReporter).unwrap();
        assert_eq!(publication.listed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn replay_panic_propagates_after_earlier_tasks_ran() {
        let reg = ContextRegistry::new();
        let ctx = ContextId::fresh();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (Task::new(ctx, 1), Task::new(ctx, 2), Task::new(ctx, 3));
        record(&reg, a, &log);
        let armed = Arc::new(Mutex::new(false));
        let arm = armed.clone();
        reg.remember_and_call(b, move || {
            if *arm.lock() {
                panic!("replay of b failed");
            }
        });
        record(&reg, c, &log);
        log.lock().clear();
        *armed.lock() = true;

        let publication = Fixed { source: ctx, tasks: vec![a, b, c], verdict: approve };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| reg.resolve(&publication, &NoReports)));

        assert!(outcome.is_err());
        assert_eq!(*log.lock(), vec![a]);
    }
}
