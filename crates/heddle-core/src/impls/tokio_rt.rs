//! TokioExecutor - tokio runtime 上で遅延実行する Executor

use std::time::Duration;

use tokio::runtime::Handle;

use crate::ports::{Executor, Job};

/// Runs jobs as tasks on a tokio runtime.
///
/// Holds a `Handle` so `schedule_after` may be called from threads outside
/// the runtime (e.g. a notification delivered on a `ThreadExecutor` thread).
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is running on.
    ///
    /// Returns `None` outside of a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Executor for TokioExecutor {
    fn schedule_after(&self, delay: Duration, job: Job) {
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            job();
        });
    }
}
