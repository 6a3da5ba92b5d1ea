//! ManualExecutor - 仮想時間で動くテスト用 Executor
//!
//! `schedule_after` は job を積むだけです。`advance()` で仮想時間を進めると、
//! 期限が来た job が呼び出し元のスレッドで順番に実行されます。

use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::ports::{Executor, Job};

/// Scheduled job entry for the priority queue.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first, then FIFO).
struct Scheduled {
    due: Duration,
    seq: u64,
    job: Job,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    jobs: BinaryHeap<Scheduled>,
}

/// Deterministic executor driven by the test.
#[derive(Default)]
pub struct ManualExecutor {
    state: Mutex<ManualState>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of jobs not yet run.
    pub fn pending(&self) -> usize {
        self.lock().jobs.len()
    }

    /// Move virtual time forward and run every job that became due.
    ///
    /// Jobs scheduled by a running job are picked up in the same call if they
    /// fall inside the window. Returns the number of jobs run.
    pub fn advance(&self, by: Duration) -> usize {
        let deadline = self.lock().now + by;
        let mut ran = 0;
        loop {
            // The lock is released before the job runs; jobs may schedule more.
            let job = {
                let mut state = self.lock();
                let due = matches!(state.jobs.peek(), Some(next) if next.due <= deadline);
                if !due {
                    state.now = deadline;
                    break;
                }
                let Some(next) = state.jobs.pop() else {
                    break;
                };
                state.now = state.now.max(next.due);
                next.job
            };
            job();
            ran += 1;
        }
        ran
    }

    /// Run jobs in due order until none are left, jumping virtual time as needed.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = {
                let mut state = self.lock();
                let Some(next) = state.jobs.pop() else {
                    break;
                };
                state.now = state.now.max(next.due);
                next.job
            };
            job();
            ran += 1;
        }
        ran
    }
}

impl Executor for ManualExecutor {
    fn schedule_after(&self, delay: Duration, job: Job) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        state.jobs.push(Scheduled { due, seq, job });
    }
}
