//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock で timestamp 部分を決める）

use crate::domain::ids::{OperationId, SubscriptionId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は Operation / Subscription の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_operation_id(&self) -> OperationId;

    fn generate_subscription_id(&self) -> SubscriptionId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// FixedClock を渡すと timestamp 部分が固定されます（ランダム部分は残る）。
#[derive(Debug, Clone, Default)]
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_operation_id(&self) -> OperationId {
        OperationId::from(self.next_ulid())
    }

    fn generate_subscription_id(&self) -> SubscriptionId {
        SubscriptionId::from(self.next_ulid())
    }
}
