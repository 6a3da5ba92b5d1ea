//! Outcome model: what a payload hands to its completion callback.
//!
//! The lifecycle flags only say *that* an operation finished. Whether the
//! work succeeded travels here, through the callback's argument.

use serde::{Deserialize, Serialize};

/// Classification of a payload failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkKind {
    /// The work ran and reported an error.
    Failed,
    /// The work noticed cancellation and stopped early.
    Cancelled,
}

/// Error returned by a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct WorkError {
    pub kind: WorkKind,
    pub message: String,
}

impl WorkError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: WorkKind::Failed,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: WorkKind::Cancelled,
            message: message.into(),
        }
    }
}

/// Result of one payload run.
pub type Outcome = Result<(), WorkError>;
