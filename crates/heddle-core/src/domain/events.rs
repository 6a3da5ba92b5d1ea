//! Events - 状態変化の通知
//!
//! Observer に渡される `ChangeEvent` を定義します。
//! 1 回の遷移につき Prior → After の 2 件が同じスレッド上で配送されます。

use serde::Serialize;

use super::ids::OperationId;
use super::state::StateKey;

/// Which half of a transition is being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStage {
    /// Delivered before the value is written.
    Prior,
    /// Delivered after the value is written.
    After,
}

/// ChangeEvent は 1 つのフラグ変化を表す
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub operation: OperationId,
    pub key: StateKey,
    pub stage: ChangeStage,
    pub old: bool,
    pub new: bool,
}

impl ChangeEvent {
    /// Is this the post-change notification of `key` becoming true?
    pub fn became_true(&self, key: StateKey) -> bool {
        self.key == key && self.stage == ChangeStage::After && !self.old && self.new
    }
}
