//! Shared start / complete path for the operation designs.
//!
//! Each design only decides where a flag change is announced
//! (`Lifecycle::channel`). Claiming, scheduling and the transition order are
//! identical.

use std::sync::Arc;

use crate::domain::StateKey;
use crate::error::OperationError;
use crate::operation::Operation;
use crate::operation::payload::Payload;
use crate::operation::state::{Flag, StartDecision};

pub(crate) trait Lifecycle: Operation + 'static {
    fn payload(&self) -> &Payload;

    /// Where a change of `flag` is announced. `None` means nowhere.
    fn channel(&self, flag: Flag) -> Option<StateKey>;
}

fn set<L: Lifecycle + ?Sized>(op: &L, flag: Flag, value: bool) {
    op.state().write(flag, value, op.channel(flag));
}

/// Claim the start and either begin the work or finish a cancelled operation.
pub(crate) fn start<L: Lifecycle>(op: Arc<L>) -> Result<(), OperationError> {
    match op.state().claim_start() {
        Err(e) => {
            tracing::warn!(error = %e, "start ignored");
            Err(e)
        }
        Ok(StartDecision::SkipCancelled) => {
            tracing::debug!(operation = %op.id(), "cancelled before start");
            drop(op.payload().take());
            set(&*op, Flag::Finished, true);
            Ok(())
        }
        Ok(StartDecision::Run) => {
            set(&*op, Flag::Executing, true);
            launch(op);
            Ok(())
        }
    }
}

/// Hand the work to the executor and return immediately.
fn launch<L: Lifecycle>(op: Arc<L>) {
    let payload = op.payload();
    tracing::info!(operation = %op.id(), "starting {}", payload.name);
    let executor = Arc::clone(&payload.executor);
    let duration = payload.duration;

    executor.schedule_after(
        duration,
        Box::new(move || {
            tracing::info!(operation = %op.id(), "finishing {}", op.payload().name);
            op.payload().run(op.state());
            if let Err(e) = complete(&*op) {
                tracing::warn!(error = %e, "completion ignored");
            }
        }),
    );
}

/// Leave executing, then enter finished. Only the first call has an effect.
pub(crate) fn complete<L: Lifecycle + ?Sized>(op: &L) -> Result<(), OperationError> {
    op.state().claim_completion()?;
    set(op, Flag::Executing, false);
    set(op, Flag::Finished, true);
    Ok(())
}

pub(crate) fn cancel<L: Lifecycle + ?Sized>(op: &L) {
    set(op, Flag::Cancelled, true);
}
