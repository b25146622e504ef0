use crate::task::{ContextId, Task};

/// Broad class of a [`ResolveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A context or task had no recorded info.
    RegistryMiss,
    /// A prepare-for-redo hook said no.
    ValidationFailure,
    /// An external prepare hook failed outright.
    HookError,
}

/// Why a publication could not be resolved.
///
/// Every variant is raised before any task is replayed: a failed resolve
/// leaves the target context exactly as it found it, apart from whatever the
/// hooks themselves did.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The source context never recorded any task.
    #[error("no task registry for {0}; its work cannot be redone")]
    ContextNotRegistered(ContextId),

    /// A task in the publication was never run through `remember_and_call`.
    #[error("task {0} has no recorded body and cannot be redone")]
    TaskNotRegistered(Task),

    /// A task's prepare-for-redo hook returned `false`.
    #[error("prepare-for-redo hook rejected redo of task {0}")]
    TaskPrepareRejected(Task),

    /// The publication's own prepare-for-redo step returned `false`.
    #[error("publication from {0} rejected redo")]
    GlobalPrepareRejected(ContextId),

    /// The publication's own prepare-for-redo step failed.
    #[error("publication prepare-for-redo failed")]
    PrepareHook(#[source] anyhow::Error),
}

impl ResolveError {
    /// The broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::ContextNotRegistered(_) | ResolveError::TaskNotRegistered(_) => {
                ErrorKind::RegistryMiss
            }
            ResolveError::TaskPrepareRejected(_) | ResolveError::GlobalPrepareRejected(_) => {
                ErrorKind::ValidationFailure
            }
            ResolveError::PrepareHook(_) => ErrorKind::HookError,
        }
    }
}
