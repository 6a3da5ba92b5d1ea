//! ThreadExecutor - OS スレッドで遅延実行する Executor

use std::thread;
use std::time::Duration;

use crate::ports::{Executor, Job};

/// Spawns one detached thread per job. Works without an async runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadExecutor;

impl ThreadExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for ThreadExecutor {
    fn schedule_after(&self, delay: Duration, job: Job) {
        let spawned = thread::Builder::new()
            .name("heddle-delay".to_string())
            .spawn(move || {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                job();
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn executor thread");
        }
    }
}
