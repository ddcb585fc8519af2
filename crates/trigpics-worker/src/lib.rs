//! Moderation queue: a bounded in-process channel drained by a worker pool.
//!
//! Producers call [`ModerationQueue::enqueue`], which never blocks. Jobs are
//! handed to a [`ModerationHandler`]; failures are retried while the error is
//! recoverable and then logged. Nothing is reported back to the producer.

pub mod context;
pub mod queue;

pub use context::{ModerationHandler, ModerationJob, ModerationOutcome};
pub use queue::{EnqueueError, ModerationPoolConfig, ModerationQueue, ModerationWorkerPool};
