//! Task identities, recorded task state, and per-thread establishment.
//!
//! A [`Task`] is a plain, copyable name for one unit of work inside an
//! isolation context. It carries no behavior of its own: what a task *did* is
//! kept in a [`TaskInfo`] inside the owning context's registry, and which task
//! is *currently running* on a thread is tracked by [`Establish`].

use crossbeam_utils::CachePadded;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Per-thread "current task" stack and its restoring guard.
pub mod establish;
/// Recorded replay state for one task.
pub mod info;

pub use establish::Establish;
pub use info::{PrepareHook, TaskFn, TaskInfo};

static NEXT_CONTEXT: CachePadded<AtomicU64> = CachePadded::new(AtomicU64::new(1));
static START_CLOCK: CachePadded<AtomicU64> = CachePadded::new(AtomicU64::new(1));

/// Identity of an isolation context.
///
/// Ids are process-unique. [`ContextId::GLOBAL`] names the root context that
/// every thread starts out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ContextId(u64);

impl ContextId {
    /// The root context.
    pub const GLOBAL: ContextId = ContextId(0);

    /// Mints an id never handed out before in this process.
    pub fn fresh() -> Self {
        ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns whether this is the root context.
    #[inline]
    pub const fn is_global(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Identity of one unit of work, scoped to its context.
///
/// The same `serial` in two different contexts names unrelated work; equality
/// and hashing therefore always include the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Task {
    context: ContextId,
    serial: u64,
}

impl Task {
    /// Serial reserved for a context's top-level task.
    pub const TOP_LEVEL_SERIAL: u64 = 0;

    /// Names task `serial` within `context`.
    #[inline]
    pub const fn new(context: ContextId, serial: u64) -> Self {
        Self { context, serial }
    }

    /// The privileged task representing `context`'s root scope.
    #[inline]
    pub const fn top_level(context: ContextId) -> Self {
        Self::new(context, Self::TOP_LEVEL_SERIAL)
    }

    /// The context this task belongs to.
    #[inline]
    pub const fn context(&self) -> ContextId {
        self.context
    }

    /// The per-context serial number.
    #[inline]
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns whether this is its context's top-level task.
    #[inline]
    pub const fn is_top_level(&self) -> bool {
        self.serial == Self::TOP_LEVEL_SERIAL
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/task#{}", self.context, self.serial)
    }
}

/// Logical start time of a task.
///
/// Stamps come from a single process-wide monotonic counter, so two tasks
/// started anywhere in the process are totally ordered by when they began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StartStamp(u64);

impl StartStamp {
    /// Takes the next stamp from the process clock.
    pub fn now() -> Self {
        StartStamp(START_CLOCK.fetch_add(1, Ordering::Relaxed))
    }

    /// Builds a stamp from a raw tick, e.g. when replaying a recorded schedule.
    #[inline]
    pub const fn from_raw(tick: u64) -> Self {
        StartStamp(tick)
    }

    /// Returns the raw tick.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}
