//! Producer-side synchronization primitives.
//!
//! - [`BoundedQueue`]: fixed-capacity FIFO handed from producers to the render thread
//! - [`ProducerLock`]: explicit acquire/release lock for batched submissions

pub mod producer_lock;
pub mod queue;
pub mod types;

pub use producer_lock::{ProducerGuard, ProducerLock};
pub use queue::BoundedQueue;
pub use types::{LockError, QueueClosed, TryPushError};
