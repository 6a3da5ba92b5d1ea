//! AsyncOperation - 正しい非同期 Operation
//!
//! `is_executing` と `is_finished` の変化をすべて Prior / After の組で通知します。
//! queue はこの通知だけを頼りに依存関係と同時実行数を管理するので、
//! ここで通知が欠けると queue は止まります（`UnobservedOperation` 参照）。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Outcome, StateKey};
use crate::error::OperationError;
use crate::operation::lifecycle::{self, Lifecycle};
use crate::operation::payload::{OnComplete, Payload, Work, idle_work};
use crate::operation::state::{Flag, OperationState};
use crate::operation::{Operation, default_ids};
use crate::ports::Executor;

/// An operation that runs its work on an executor after `duration` and
/// announces every lifecycle transition.
pub struct AsyncOperation {
    state: OperationState,
    payload: Payload,
}

impl AsyncOperation {
    /// Build an operation. No side effects; every flag starts false.
    pub fn new(
        name: impl Into<String>,
        duration: Duration,
        executor: Arc<dyn Executor>,
        work: Work,
        on_complete: OnComplete,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: OperationState::new(default_ids()),
            payload: Payload::new(name.into(), duration, executor, work, on_complete),
        })
    }

    /// An operation whose only job is to wait `duration` and then call back.
    pub fn delayed(
        name: impl Into<String>,
        duration: Duration,
        executor: Arc<dyn Executor>,
        on_complete: impl FnOnce(Outcome) + Send + 'static,
    ) -> Arc<Self> {
        Self::new(name, duration, executor, idle_work(), Box::new(on_complete))
    }

    /// Leave the executing state and enter finished, announcing both.
    ///
    /// Called by the payload path once the work and the callback are done.
    /// Only the first call has any effect.
    pub fn complete_operation(&self) -> Result<(), OperationError> {
        lifecycle::complete(self)
    }
}

impl Lifecycle for AsyncOperation {
    fn payload(&self) -> &Payload {
        &self.payload
    }

    fn channel(&self, flag: Flag) -> Option<StateKey> {
        Some(flag.key())
    }
}

impl Operation for AsyncOperation {
    fn state(&self) -> &OperationState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.payload.name
    }

    fn start(self: Arc<Self>) -> Result<(), OperationError> {
        lifecycle::start(self)
    }

    fn cancel(&self) {
        lifecycle::cancel(self);
    }
}
