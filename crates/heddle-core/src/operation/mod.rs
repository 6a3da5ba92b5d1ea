//! Operations: asynchronous units of work with an observable lifecycle.
//!
//! # 主要コンポーネント
//! - **Operation**: queue から見た契約（start / cancel / flag 読み取り / observe）
//! - **OperationState**: ロックで守られたフラグと通知プロトコル
//! - **AsyncOperation**: 正しい実装（遷移ごとに Prior / After を通知）
//! - **UnobservedOperation**: 壊れた実装（通知しない、または別のキーに通知する）

pub mod asynchronous;
mod lifecycle;
pub mod observers;
pub mod payload;
pub mod state;
pub mod unobserved;

pub use self::asynchronous::AsyncOperation;
pub use self::observers::{Observer, ObserverRegistry};
pub use self::payload::{OnComplete, Work, WorkContext, idle_work};
pub use self::state::OperationState;
pub use self::unobserved::{Silence, UnobservedOperation};

use std::sync::Arc;

use crate::domain::{OperationId, Phase, StateKey, SubscriptionId};
use crate::error::OperationError;
use crate::ports::{IdGenerator, SystemClock, UlidGenerator};

/// The contract a queue relies on.
///
/// Accessors and observer registration have default implementations on top
/// of `state()`; implementors supply the transitions.
pub trait Operation: Send + Sync {
    fn state(&self) -> &OperationState;

    fn name(&self) -> &str;

    /// `start()` may return before the operation finishes.
    fn is_asynchronous(&self) -> bool {
        true
    }

    /// Begin the operation. Must not block for the length of the work.
    ///
    /// A second call returns `AlreadyStarted` and does nothing else.
    fn start(self: Arc<Self>) -> Result<(), OperationError>;

    /// Request cooperative cancellation. One-way; callable from any thread.
    fn cancel(&self);

    fn id(&self) -> OperationId {
        self.state().id()
    }

    fn is_executing(&self) -> bool {
        self.state().is_executing()
    }

    fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    fn is_cancelled(&self) -> bool {
        self.state().is_cancelled()
    }

    fn phase(&self) -> Option<Phase> {
        self.state().phase()
    }

    fn observe(&self, key: StateKey, observer: Observer) -> SubscriptionId {
        self.state().observe(key, observer)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.state().unobserve(id)
    }
}

/// ID generator used when the caller does not inject one.
pub(crate) fn default_ids() -> Arc<dyn IdGenerator> {
    Arc::new(UlidGenerator::new(SystemClock))
}
