//! Error types shared by the queue and the producer lock.

use std::fmt;
use thiserror::Error;

/// The queue was shut down before the item could be enqueued.
///
/// Carries the rejected item back to the caller, so nothing submitted after
/// shutdown is lost without the producer knowing about it.
#[derive(Error, PartialEq, Eq, Clone, Copy)]
#[error("queue is closed")]
pub struct QueueClosed<T>(pub T);

impl<T> QueueClosed<T> {
    /// Returns the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

// Manual impl so `T` does not need to be `Debug`.
impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

/// Failure of a non-blocking or time-limited push.
#[derive(Error, PartialEq, Eq, Clone, Copy)]
pub enum TryPushError<T> {
    #[error("queue is full")]
    Full(T),

    #[error("queue is closed")]
    Closed(T),

    #[error("timed out waiting for queue space")]
    Timeout(T),
}

impl<T> TryPushError<T> {
    /// Returns the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) | TryPushError::Timeout(item) => {
                item
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TryPushError::Closed(_))
    }
}

impl<T> fmt::Debug for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => f.write_str("Full(..)"),
            TryPushError::Closed(_) => f.write_str("Closed(..)"),
            TryPushError::Timeout(_) => f.write_str("Timeout(..)"),
        }
    }
}

impl<T> From<QueueClosed<T>> for TryPushError<T> {
    fn from(err: QueueClosed<T>) -> Self {
        TryPushError::Closed(err.0)
    }
}

/// Misuse or cancellation of the [`ProducerLock`](super::ProducerLock).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// `release` was called by a thread that does not hold the lock.
    #[error("producer lock released by a thread that does not hold it")]
    NotOwner,

    /// The calling thread already holds the lock (the lock is not re-entrant).
    #[error("producer lock is already held by the calling thread")]
    AlreadyHeld,

    /// The lock was closed during shutdown while waiting to acquire it.
    #[error("producer lock is closed")]
    Closed,
}
