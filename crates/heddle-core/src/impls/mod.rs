//! Impls - Executor の実装
//!
//! - ThreadExecutor: 本番用（runtime 不要）
//! - TokioExecutor: tokio runtime 上で動かす場合
//! - ManualExecutor: テスト用（仮想時間）

pub mod manual;
pub mod thread;
pub mod tokio_rt;

pub use self::manual::ManualExecutor;
pub use self::thread::ThreadExecutor;
pub use self::tokio_rt::TokioExecutor;
