//! Fixed-capacity FIFO shared between producer threads and the render thread.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::types::{QueueClosed, TryPushError};

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-producer, single-consumer queue.
///
/// Producers block in [`push`](Self::push) while the queue is full. The
/// consumer takes everything at once with [`drain_all`](Self::drain_all),
/// which never waits for producers. Size and the closed flag are guarded by
/// the same mutex, so two producers can never both claim the last free slot.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Appends `item`, waiting for space while the queue is full.
    ///
    /// # Errors
    /// Returns the item inside [`QueueClosed`] if the queue is shut down
    /// before or while waiting.
    pub fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(QueueClosed(item));
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                return Ok(());
            }
            self.not_full.wait(&mut state);
        }
    }

    /// Appends `item` only if there is room right now.
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TryPushError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(TryPushError::Full(item));
        }
        state.items.push_back(item);
        Ok(())
    }

    /// Like [`push`](Self::push), but gives up after `timeout`.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), TryPushError<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(TryPushError::Closed(item));
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                return Ok(());
            }
            if self.not_full.wait_until(&mut state, deadline).timed_out() {
                // Space may have been freed right at the deadline.
                if !state.closed && state.items.len() < self.capacity {
                    state.items.push_back(item);
                    return Ok(());
                }
                return Err(TryPushError::Timeout(item));
            }
        }
    }

    /// Appends `item` without waiting, evicting the oldest item when full.
    ///
    /// Returns the evicted item, if any, so the caller can account for it.
    pub fn push_overwrite(&self, item: T) -> Result<Option<T>, QueueClosed<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueClosed(item));
        }
        let evicted = if state.items.len() >= self.capacity {
            state.items.pop_front()
        } else {
            None
        };
        state.items.push_back(item);
        Ok(evicted)
    }

    /// Removes and returns every queued item in FIFO order.
    ///
    /// Returns an empty vector when nothing is queued. Wakes all producers
    /// blocked on a full queue.
    pub fn drain_all(&self) -> Vec<T> {
        let drained: Vec<T> = {
            let mut state = self.state.lock();
            if state.items.is_empty() {
                return Vec::new();
            }
            state.items.drain(..).collect()
        };
        self.not_full.notify_all();
        drained
    }

    /// Closes the queue and wakes every blocked producer. Idempotent.
    ///
    /// Items already queued stay available to [`drain_all`](Self::drain_all).
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            log::debug!(
                "Queue closed with {} item(s) pending",
                state.items.len()
            );
        }
        drop(state);
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
