//! UnobservedOperation - わざと壊した Operation（テスト用の反例）
//!
//! 見た目の挙動は `AsyncOperation` と同じです。work は走り、callback も呼ばれ、
//! フラグの値もちゃんと変わります。ただし `isExecuting` / `isFinished` の
//! 変化を通知しないので、通知を待つ queue は永遠に止まります。
//!
//! 直さないこと。queue が通知だけに頼っていることを示すための fixture です。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Outcome, StateKey};
use crate::error::OperationError;
use crate::operation::lifecycle::{self, Lifecycle};
use crate::operation::payload::{OnComplete, Payload, Work, idle_work};
use crate::operation::state::{Flag, OperationState};
use crate::operation::{Operation, default_ids};
use crate::ports::Executor;

/// How the lifecycle transitions fail to reach observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Silence {
    /// No notifications at all.
    Quiet,
    /// Notifications on `"executing"` / `"finished"` instead of the flag keys.
    MisnamedKeys,
    /// Notifications on `"invalidExecuting"` / `"invalidFinished"`.
    InvalidKeys,
}

impl Silence {
    fn channel(self, flag: Flag) -> Option<StateKey> {
        match (self, flag) {
            (Silence::Quiet, _) => None,
            (Silence::MisnamedKeys, Flag::Executing) => Some(StateKey::Named("executing")),
            (Silence::MisnamedKeys, Flag::Finished) => Some(StateKey::Named("finished")),
            (Silence::InvalidKeys, Flag::Executing) => Some(StateKey::Named("invalidExecuting")),
            (Silence::InvalidKeys, Flag::Finished) => Some(StateKey::Named("invalidFinished")),
            // Cancellation is announced correctly in every flavour.
            (_, Flag::Cancelled) => Some(StateKey::IsCancelled),
        }
    }
}

/// Same surface as `AsyncOperation`; lifecycle transitions go unannounced.
pub struct UnobservedOperation {
    state: OperationState,
    payload: Payload,
    silence: Silence,
}

impl UnobservedOperation {
    pub fn new(
        name: impl Into<String>,
        duration: Duration,
        executor: Arc<dyn Executor>,
        silence: Silence,
        work: Work,
        on_complete: OnComplete,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: OperationState::new(default_ids()),
            payload: Payload::new(name.into(), duration, executor, work, on_complete),
            silence,
        })
    }

    pub fn delayed(
        name: impl Into<String>,
        duration: Duration,
        executor: Arc<dyn Executor>,
        silence: Silence,
        on_complete: impl FnOnce(Outcome) + Send + 'static,
    ) -> Arc<Self> {
        Self::new(
            name,
            duration,
            executor,
            silence,
            idle_work(),
            Box::new(on_complete),
        )
    }

    pub fn silence(&self) -> Silence {
        self.silence
    }

    pub fn complete_operation(&self) -> Result<(), OperationError> {
        lifecycle::complete(self)
    }
}

impl Lifecycle for UnobservedOperation {
    fn payload(&self) -> &Payload {
        &self.payload
    }

    fn channel(&self, flag: Flag) -> Option<StateKey> {
        self.silence.channel(flag)
    }
}

impl Operation for UnobservedOperation {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, Phase};
    use crate::impls::ManualExecutor;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn listen(op: &UnobservedOperation, key: StateKey) -> Arc<Mutex<Vec<ChangeEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        op.observe(key, Arc::new(move |e| sink.lock().unwrap().push(*e)));
        log
    }

    #[rstest]
    #[case::quiet(Silence::Quiet)]
    #[case::misnamed(Silence::MisnamedKeys)]
    #[case::invalid(Silence::InvalidKeys)]
    fn flags_change_but_flag_observers_hear_nothing(#[case] silence: Silence) {
        let exec = Arc::new(ManualExecutor::new());
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        let op = UnobservedOperation::delayed("bad", Duration::from_secs(2), exec.clone(), silence, move |_| {
            f.store(true, Ordering::SeqCst);
        });
        let executing = listen(&op, StateKey::IsExecuting);
        let finished = listen(&op, StateKey::IsFinished);

        Arc::clone(&op).start().unwrap();
        assert_eq!(op.phase(), Some(Phase::Executing));
        exec.run_until_idle();

        assert_eq!(op.phase(), Some(Phase::Finished));
        assert!(fired.load(Ordering::SeqCst));
        assert!(executing.lock().unwrap().is_empty());
        assert!(finished.lock().unwrap().is_empty());
    }

    #[rstest]
    #[case::misnamed(Silence::MisnamedKeys, "finished")]
    #[case::invalid(Silence::InvalidKeys, "invalidFinished")]
    fn misdirected_flavours_post_to_the_wrong_key(#[case] silence: Silence, #[case] key: &'static str) {
        let exec = Arc::new(ManualExecutor::new());
        let op = UnobservedOperation::delayed("bad", Duration::ZERO, exec.clone(), silence, |_| {});
        let wrong = listen(&op, StateKey::Named(key));

        Arc::clone(&op).start().unwrap();
        exec.run_until_idle();

        let events = wrong.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| !e.old && e.new));
    }

    #[test]
    fn cancelled_before_start_still_finishes() {
        let exec = Arc::new(ManualExecutor::new());
        let op = UnobservedOperation::delayed("bad", Duration::from_secs(2), exec.clone(), Silence::Quiet, |_| {
            panic!("payload must not run");
        });

        op.cancel();
        Arc::clone(&op).start().unwrap();

        assert!(op.is_finished());
        assert_eq!(exec.pending(), 0);
    }

    #[test]
    fn second_start_is_refused_like_the_announcing_design() {
        let exec = Arc::new(ManualExecutor::new());
        let op = UnobservedOperation::delayed("bad", Duration::from_secs(1), exec.clone(), Silence::Quiet, |_| {});

        Arc::clone(&op).start().unwrap();
        assert_eq!(
            Arc::clone(&op).start(),
            Err(OperationError::AlreadyStarted(op.id()))
        );
        assert_eq!(exec.pending(), 1);
    }
}
