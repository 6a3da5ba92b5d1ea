//! Queue configuration.

use serde::{Deserialize, Serialize};

/// Settings for an `OperationQueue`.
///
/// ```json
/// { "name": "uploads", "max_concurrent_operations": 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Label used in log lines.
    pub name: String,

    /// Ceiling on operations started but not yet reported finished.
    /// `None` means unbounded. `Some(0)` is treated as 1.
    pub max_concurrent_operations: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_concurrent_operations: None,
        }
    }
}

impl QueueConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_operations = Some(max);
        self
    }

    /// Effective ceiling.
    pub fn limit(&self) -> usize {
        self.max_concurrent_operations
            .map(|n| n.max(1))
            .unwrap_or(usize::MAX)
    }
}
