//! Operation lifecycle state and the observation channels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of an operation.
///
/// State transitions:
/// - Idle -> Executing -> Finished
/// - Idle -> Finished (cancelled before start)
///
/// `Finished` is terminal. `is_cancelled` is a separate flag, not a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Executing,
    Finished,
}

impl Phase {
    /// Derive the phase from the two lifecycle flags.
    ///
    /// Returns `None` for the forbidden combination (both set).
    pub fn from_flags(executing: bool, finished: bool) -> Option<Self> {
        match (executing, finished) {
            (false, false) => Some(Phase::Idle),
            (true, false) => Some(Phase::Executing),
            (false, true) => Some(Phase::Finished),
            (true, true) => None,
        }
    }
}

/// Channel an observer subscribes to.
///
/// A scheduler listens on `IsExecuting` / `IsFinished`. `Named` carries any
/// other key; a notification sent there is invisible to those listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    IsExecuting,
    IsFinished,
    IsCancelled,
    Named(&'static str),
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::IsExecuting => "isExecuting",
            StateKey::IsFinished => "isFinished",
            StateKey::IsCancelled => "isCancelled",
            StateKey::Named(name) => name,
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::idle(false, false, Some(Phase::Idle))]
    #[case::executing(true, false, Some(Phase::Executing))]
    #[case::finished(false, true, Some(Phase::Finished))]
    #[case::forbidden(true, true, None)]
    fn phase_from_flags(
        #[case] executing: bool,
        #[case] finished: bool,
        #[case] expected: Option<Phase>,
    ) {
        assert_eq!(Phase::from_flags(executing, finished), expected);
    }

    #[test]
    fn named_keys_are_distinct_from_flag_keys() {
        assert_ne!(StateKey::Named("isFinished"), StateKey::IsFinished);
        assert_eq!(StateKey::Named("finished").to_string(), "finished");
        assert_eq!(StateKey::IsExecuting.to_string(), "isExecuting");
    }
}
