//! Executor port - 遅延実行の抽象化
//!
//! Operation は「duration 後にこの処理を別コンテキストで走らせる」ことだけを
//! Executor に依頼します。グローバルなキューは持ちません。
//!
//! # 実装
//! - **ThreadExecutor**: OS スレッド + sleep
//! - **TokioExecutor**: tokio runtime 上の `sleep` + spawn
//! - **ManualExecutor**: テスト用。`advance()` するまで何も走らない

use std::time::Duration;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executor runs a job on some background context after a delay.
///
/// `schedule_after` must return without waiting for the job.
pub trait Executor: Send + Sync {
    fn schedule_after(&self, delay: Duration, job: Job);
}
