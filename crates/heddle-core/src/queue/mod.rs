//! Queue module: dependency ordering, concurrency ceiling, and the queue
//! that drives operations from their finish notifications.

mod config;
mod counts;
mod dependency;
mod operation_queue;

pub use config::QueueConfig;
pub use counts::QueueCounts;
pub use dependency::DependencyGraph;
pub use operation_queue::OperationQueue;
