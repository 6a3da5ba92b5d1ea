//! Ports - 抽象化レイヤー
//!
//! Operation と Queue が外部に依存する部分（時刻、ID、バックグラウンド実行）を
//! trait として切り出しています。テストでは決定的な実装に差し替えます。

pub mod clock;
pub mod executor;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::{Executor, Job};
pub use self::id_generator::{IdGenerator, UlidGenerator};
