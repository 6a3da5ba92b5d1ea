//! Domain model (IDs, lifecycle state, change events, outcomes).

pub mod events;
pub mod ids;
pub mod outcome;
pub mod state;

pub use self::events::{ChangeEvent, ChangeStage};
pub use self::ids::{OperationId, SubscriptionId};
pub use self::outcome::{Outcome, WorkError, WorkKind};
pub use self::state::{Phase, StateKey};
