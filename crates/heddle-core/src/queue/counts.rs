use serde::{Deserialize, Serialize};

/// Snapshot of where the queue thinks its operations are.
///
/// Built from finish notifications only. An operation that finished
/// without announcing it stays in `running` forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Enqueued, waiting on dependencies.
    pub waiting: usize,
    /// Enqueued, eligible, not yet started (no free slot).
    pub ready: usize,
    /// Started, finish not yet heard.
    pub running: usize,
    /// Finish heard.
    pub finished: usize,
}
