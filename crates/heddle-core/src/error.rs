use thiserror::Error;

use crate::domain::OperationId;

/// Programmer errors at the operation boundary.
///
/// Neither variant leaves the operation in a bad state: the call is refused
/// and the flags are untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("operation {0} was already started")]
    AlreadyStarted(OperationId),

    #[error("operation {0} was already completed")]
    AlreadyCompleted(OperationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("operation {0} is already in the queue")]
    AlreadyEnqueued(OperationId),

    #[error("dependency would create a cycle: {0:?}")]
    DependencyCycle(Vec<OperationId>),

    #[error("operation {0} was already enqueued; dependencies must be declared first")]
    DependencyAfterEnqueue(OperationId),
}
