//! heddle-core
//!
//! Observable asynchronous operations and the queue that schedules them.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state keys, change events, outcome）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, Executor）
//! - **impls**: Executor 実装（thread, tokio, 手動で時間を進める ManualExecutor）
//! - **operation**: Operation trait と 2 つの実装（通知する版 / 通知しない版）
//! - **queue**: 依存関係と同時実行数を扱う OperationQueue
//! - **error**: エラー型

pub mod domain;
pub mod error;
pub mod impls;
pub mod operation;
pub mod ports;
pub mod queue;

pub use domain::{ChangeEvent, ChangeStage, OperationId, Outcome, Phase, StateKey, WorkError};
pub use error::{OperationError, QueueError};
pub use operation::{AsyncOperation, Operation, Silence, UnobservedOperation};
pub use queue::{OperationQueue, QueueConfig, QueueCounts};
