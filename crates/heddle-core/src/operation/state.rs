//! Guarded lifecycle flags and the notify-write-notify transition protocol.
//!
//! One `Mutex` per operation guards all three flags plus the start/complete
//! claims. Observers are always called with that lock released, so an
//! observer may read the operation's flags (or start another operation)
//! from inside its callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{ChangeEvent, ChangeStage, OperationId, Phase, StateKey, SubscriptionId};
use crate::error::OperationError;
use crate::operation::observers::{Observer, ObserverRegistry, deliver};
use crate::ports::IdGenerator;

/// One of the three observable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    Executing,
    Finished,
    Cancelled,
}

impl Flag {
    /// The channel a correct operation announces this flag on.
    pub(crate) fn key(self) -> StateKey {
        match self {
            Flag::Executing => StateKey::IsExecuting,
            Flag::Finished => StateKey::IsFinished,
            Flag::Cancelled => StateKey::IsCancelled,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Flag::Executing => 0b001,
            Flag::Finished => 0b010,
            Flag::Cancelled => 0b100,
        }
    }
}

/// What `start()` should do, decided under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartDecision {
    Run,
    SkipCancelled,
}

#[derive(Debug, Default)]
struct Flags {
    executing: bool,
    finished: bool,
    cancelled: bool,

    /// `start()` has been claimed.
    started: bool,
    /// The completion path has been claimed.
    completed: bool,
    /// Flags with a write between their Prior and After notifications.
    in_flight: u8,
}

impl Flags {
    fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Executing => self.executing,
            Flag::Finished => self.finished,
            Flag::Cancelled => self.cancelled,
        }
    }

    fn set(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Executing => self.executing = value,
            Flag::Finished => self.finished = value,
            Flag::Cancelled => self.cancelled = value,
        }
    }
}

/// Lifecycle state shared by every operation flavour.
pub struct OperationState {
    id: OperationId,
    flags: Mutex<Flags>,
    observers: ObserverRegistry,
    ids: Arc<dyn IdGenerator>,
}

impl OperationState {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            id: ids.generate_operation_id(),
            flags: Mutex::new(Flags::default()),
            observers: ObserverRegistry::new(),
            ids,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Flags> {
        // Flags are plain bools; a panic elsewhere cannot leave them torn.
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn is_executing(&self) -> bool {
        self.lock().executing
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Both flags read under one lock acquisition.
    ///
    /// `None` means executing and finished were both set, which the
    /// transition order never produces.
    pub fn phase(&self) -> Option<Phase> {
        let flags = self.lock();
        Phase::from_flags(flags.executing, flags.finished)
    }

    pub fn observe(&self, key: StateKey, observer: Observer) -> SubscriptionId {
        let id = self.ids.generate_subscription_id();
        self.observers.add(id, key, observer);
        id
    }

    pub fn unobserve(&self, id: SubscriptionId) -> bool {
        self.observers.remove(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Claim the single `start()` call.
    ///
    /// The cancelled flag is read under the same lock, so a concurrent
    /// `cancel()` lands either wholly before or wholly after this decision.
    pub(crate) fn claim_start(&self) -> Result<StartDecision, OperationError> {
        let mut flags = self.lock();
        if flags.started {
            return Err(OperationError::AlreadyStarted(self.id));
        }
        flags.started = true;
        if flags.cancelled {
            // The payload will never run; nothing may complete it later.
            flags.completed = true;
            Ok(StartDecision::SkipCancelled)
        } else {
            Ok(StartDecision::Run)
        }
    }

    /// Claim the single completion.
    pub(crate) fn claim_completion(&self) -> Result<(), OperationError> {
        let mut flags = self.lock();
        if flags.completed || flags.finished {
            return Err(OperationError::AlreadyCompleted(self.id));
        }
        flags.completed = true;
        Ok(())
    }

    /// Change `flag` to `value`.
    ///
    /// With `channel = Some(key)` observers of `key` get a Prior event before
    /// the write and an After event once it is visible. `None` writes silently.
    /// An observer registered while the transition is in progress gets the
    /// After event only.
    /// Returns false without notifying when the value is already `value` or
    /// another thread is mid-transition on the same flag.
    pub(crate) fn write(&self, flag: Flag, value: bool, channel: Option<StateKey>) -> bool {
        let old = {
            let mut flags = self.lock();
            let old = flags.get(flag);
            if old == value || flags.in_flight & flag.bit() != 0 {
                return false;
            }
            flags.in_flight |= flag.bit();
            old
        };

        if let Some(key) = channel {
            deliver(
                &self.observers.snapshot(key),
                &self.event(key, ChangeStage::Prior, old, value),
            );
        }

        {
            let mut flags = self.lock();
            flags.set(flag, value);
            flags.in_flight &= !flag.bit();
        }

        tracing::debug!(
            operation = %self.id,
            flag = %flag.key(),
            channel = channel.map(|key| key.as_str()).unwrap_or("<none>"),
            old,
            new = value,
            "transition"
        );

        // Snapshot taken after the write: an observer that registers at any
        // point either hears After or finds the new value already readable.
        if let Some(key) = channel {
            deliver(
                &self.observers.snapshot(key),
                &self.event(key, ChangeStage::After, old, value),
            );
        }
        true
    }

    fn event(&self, key: StateKey, stage: ChangeStage, old: bool, new: bool) -> ChangeEvent {
        ChangeEvent {
            operation: self.id,
            key,
            stage,
            old,
            new,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{SystemClock, UlidGenerator};

    fn state() -> OperationState {
        OperationState::new(Arc::new(UlidGenerator::new(SystemClock)))
    }

    fn record(state: &OperationState, key: StateKey) -> Arc<Mutex<Vec<ChangeEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        state.observe(key, Arc::new(move |e| sink.lock().unwrap().push(*e)));
        log
    }

    #[test]
    fn new_state_is_idle() {
        let s = state();
        assert_eq!(s.phase(), Some(Phase::Idle));
        assert!(!s.is_executing());
        assert!(!s.is_finished());
        assert!(!s.is_cancelled());
    }

    #[test]
    fn write_notifies_prior_then_after() {
        let s = state();
        let log = record(&s, StateKey::IsExecuting);

        assert!(s.write(Flag::Executing, true, Some(StateKey::IsExecuting)));

        let events = log.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stage, ChangeStage::Prior);
        assert_eq!(events[1].stage, ChangeStage::After);
        assert!(events.iter().all(|e| !e.old && e.new && e.operation == s.id()));
    }

    #[test]
    fn prior_observer_sees_old_value_after_observer_sees_new() {
        let s = Arc::new(state());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s2, seen2) = (Arc::clone(&s), Arc::clone(&seen));
        s.observe(
            StateKey::IsFinished,
            Arc::new(move |e| seen2.lock().unwrap().push((e.stage, s2.is_finished()))),
        );

        s.write(Flag::Finished, true, Some(StateKey::IsFinished));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(ChangeStage::Prior, false), (ChangeStage::After, true)]
        );
    }

    #[test]
    fn unchanged_write_is_silent() {
        let s = state();
        let log = record(&s, StateKey::IsExecuting);

        assert!(!s.write(Flag::Executing, false, Some(StateKey::IsExecuting)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn silent_write_changes_value_without_events() {
        let s = state();
        let log = record(&s, StateKey::IsFinished);

        assert!(s.write(Flag::Finished, true, None));
        assert!(s.is_finished());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn misdirected_write_reaches_only_that_channel() {
        let s = state();
        let finished = record(&s, StateKey::IsFinished);
        let named = record(&s, StateKey::Named("finished"));

        s.write(Flag::Finished, true, Some(StateKey::Named("finished")));

        assert!(finished.lock().unwrap().is_empty());
        assert_eq!(named.lock().unwrap().len(), 2);
    }

    #[test]
    fn start_can_be_claimed_once() {
        let s = state();
        assert_eq!(s.claim_start(), Ok(StartDecision::Run));
        assert_eq!(s.claim_start(), Err(OperationError::AlreadyStarted(s.id())));
    }

    #[test]
    fn cancelled_start_also_claims_completion() {
        let s = state();
        s.write(Flag::Cancelled, true, Some(StateKey::IsCancelled));

        assert_eq!(s.claim_start(), Ok(StartDecision::SkipCancelled));
        assert_eq!(
            s.claim_completion(),
            Err(OperationError::AlreadyCompleted(s.id()))
        );
    }

    #[test]
    fn completion_can_be_claimed_once() {
        let s = state();
        assert!(s.claim_completion().is_ok());
        assert!(s.claim_completion().is_err());
    }

    #[test]
    fn observer_may_unregister_itself_during_delivery() {
        let s = Arc::new(state());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (s2, slot2) = (Arc::clone(&s), Arc::clone(&slot));
        let id = s.observe(
            StateKey::IsExecuting,
            Arc::new(move |_| {
                if let Some(id) = slot2.lock().unwrap().take() {
                    s2.unobserve(id);
                }
            }),
        );
        *slot.lock().unwrap() = Some(id);

        s.write(Flag::Executing, true, Some(StateKey::IsExecuting));
        assert_eq!(s.observer_count(), 0);
    }

    #[test]
    fn observer_registered_during_prior_hears_after() {
        let s = Arc::new(state());
        let late: Arc<Mutex<Vec<ChangeEvent>>> = Arc::default();
        let (s2, late2) = (Arc::clone(&s), Arc::clone(&late));
        s.observe(
            StateKey::IsFinished,
            Arc::new(move |e| {
                if e.stage == ChangeStage::Prior {
                    let sink = Arc::clone(&late2);
                    s2.observe(
                        StateKey::IsFinished,
                        Arc::new(move |e| sink.lock().unwrap().push(*e)),
                    );
                }
            }),
        );

        s.write(Flag::Finished, true, Some(StateKey::IsFinished));

        let late = late.lock().unwrap();
        assert_eq!(late.len(), 1);
        assert!(late[0].became_true(StateKey::IsFinished));
    }

    #[test]
    fn observer_removed_during_prior_misses_after() {
        let s = Arc::new(state());
        let victim_log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&victim_log);
        let victim = s.observe(
            StateKey::IsFinished,
            Arc::new(move |e: &ChangeEvent| sink.lock().unwrap().push(e.stage)),
        );
        let s2 = Arc::clone(&s);
        let pending = Mutex::new(Some(victim));
        s.observe(
            StateKey::IsFinished,
            Arc::new(move |_| {
                if let Some(id) = pending.lock().unwrap().take() {
                    s2.unobserve(id);
                }
            }),
        );

        s.write(Flag::Finished, true, Some(StateKey::IsFinished));

        assert_eq!(*victim_log.lock().unwrap(), vec![ChangeStage::Prior]);
        assert_eq!(s.observer_count(), 1);
    }
}
