//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! Operation と Subscription の ID はどちらも ULID を使います。
//! Phantom type パターンで共通実装を一つにまとめつつ、
//! `OperationId` と `SubscriptionId` をコンパイル時に区別します。
//!
//! - **時刻でソート可能**: 生成順に並ぶので、ログを追いやすい
//! - **調整なしで生成可能**: グローバルなカウンタが要らない

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"op-", "sub-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData なので実行時のメモリは消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Operation のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {}

impl IdMarker for Operation {
    fn prefix() -> &'static str {
        "op-"
    }
}

/// Subscription（observer 登録）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subscription {}

impl IdMarker for Subscription {
    fn prefix() -> &'static str {
        "sub-"
    }
}

/// Identifier of an operation. The queue keys dependency edges by it.
pub type OperationId = Id<Operation>;

/// Identifier of one observer registration (returned by `observe`).
pub type SubscriptionId = Id<Subscription>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let op = OperationId::from_ulid(ulid1);
        let sub = SubscriptionId::from_ulid(ulid2);

        assert_eq!(op.as_ulid(), ulid1);
        assert_eq!(sub.as_ulid(), ulid2);

        assert!(op.to_string().starts_with("op-"));
        assert!(sub.to_string().starts_with("sub-"));
        // let _: OperationId = sub; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = OperationId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = OperationId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn ids_survive_json() {
        let op = OperationId::from_ulid(Ulid::new());

        let serialized = serde_json::to_string(&op).unwrap();
        let deserialized: OperationId = serde_json::from_str(&serialized).unwrap();

        assert_eq!(op, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<OperationId>(), size_of::<Ulid>());
        assert_eq!(size_of::<SubscriptionId>(), 16);
    }
}
