//! The opaque unit of work an operation carries, plus its completion callback.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::domain::{OperationId, Outcome};
use crate::operation::state::OperationState;
use crate::ports::Executor;

/// What the payload can see while it runs.
pub struct WorkContext<'a> {
    state: &'a OperationState,
}

impl<'a> WorkContext<'a> {
    pub(crate) fn new(state: &'a OperationState) -> Self {
        Self { state }
    }

    pub fn operation(&self) -> OperationId {
        self.state.id()
    }

    /// Cooperative cancellation check. Nothing stops the work if it ignores this.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// The work itself. Runs once, on the executor, after the operation's delay.
pub type Work = Box<dyn FnOnce(&WorkContext<'_>) -> Outcome + Send + 'static>;

/// Called with the work's outcome, before the operation reports finished.
pub type OnComplete = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Name, delay, executor, and the one-shot closures.
pub(crate) struct Payload {
    pub(crate) name: String,
    pub(crate) duration: Duration,
    pub(crate) executor: Arc<dyn Executor>,
    closures: Mutex<Option<(Work, OnComplete)>>,
}

impl Payload {
    pub(crate) fn new(
        name: String,
        duration: Duration,
        executor: Arc<dyn Executor>,
        work: Work,
        on_complete: OnComplete,
    ) -> Self {
        Self {
            name,
            duration,
            executor,
            closures: Mutex::new(Some((work, on_complete))),
        }
    }

    /// Hand out the closures. `None` on every call after the first.
    pub(crate) fn take(&self) -> Option<(Work, OnComplete)> {
        self.closures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Run work then callback. Returns false if they were already taken.
    pub(crate) fn run(&self, state: &OperationState) -> bool {
        let Some((work, on_complete)) = self.take() else {
            return false;
        };
        let outcome = work(&WorkContext::new(state));
        if let Err(e) = &outcome {
            tracing::debug!(operation = %state.id(), error = %e, "work reported failure");
        }
        on_complete(outcome);
        true
    }
}

/// Work that does nothing but succeed; the delay is the whole job.
pub fn idle_work() -> Work {
    Box::new(|_| Ok(()))
}
