//! Explicit acquire/release lock that serializes multi-item submissions.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use super::types::LockError;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    /// Next ticket handed to an acquirer.
    next_ticket: u64,
    /// Ticket currently allowed to take the lock.
    serving: u64,
    closed: bool,
}

/// Owner-tracking producer lock with FIFO hand-off.
///
/// Unlike a plain mutex the holder is recorded, so releasing from the wrong
/// thread is reported as [`LockError::NotOwner`] instead of being undefined.
/// Waiters are served in arrival order (ticket lock). The lock is not
/// re-entrant: acquiring it twice from the same thread fails with
/// [`LockError::AlreadyHeld`].
///
/// Holding the lock only excludes other producers. The consumer keeps
/// draining the queue concurrently.
#[derive(Debug, Default)]
pub struct ProducerLock {
    state: Mutex<LockState>,
    turn: Condvar,
}

impl ProducerLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the calling thread holds the lock.
    ///
    /// # Errors
    /// - [`LockError::AlreadyHeld`] if the caller already holds it.
    /// - [`LockError::Closed`] if the lock is closed before it is granted.
    pub fn acquire(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.closed {
            return Err(LockError::Closed);
        }
        if state.owner == Some(me) {
            return Err(LockError::AlreadyHeld);
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        loop {
            if state.closed {
                return Err(LockError::Closed);
            }
            if state.owner.is_none() && state.serving == ticket {
                state.owner = Some(me);
                return Ok(());
            }
            self.turn.wait(&mut state);
        }
    }

    /// Releases the lock held by the calling thread and hands it to the next
    /// waiter in line.
    ///
    /// # Errors
    /// [`LockError::NotOwner`] if the caller does not hold the lock.
    pub fn release(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            log::error!(
                "Producer lock released by {:?}, but it is held by {:?}",
                me,
                state.owner
            );
            return Err(LockError::NotOwner);
        }
        state.owner = None;
        state.serving += 1;
        drop(state);
        self.turn.notify_all();
        Ok(())
    }

    /// Acquires the lock and returns a guard that releases it when dropped.
    pub fn lock(&self) -> Result<ProducerGuard<'_>, LockError> {
        self.acquire()?;
        Ok(ProducerGuard {
            lock: self,
            released: false,
            _not_send: PhantomData,
        })
    }

    /// Rejects all current and future acquirers with [`LockError::Closed`].
    ///
    /// A thread already holding the lock keeps it and may still release it.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.turn.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Thread currently holding the lock, if any.
    pub fn holder(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }

    /// Whether the calling thread holds the lock.
    pub fn is_held_by_current(&self) -> bool {
        self.holder() == Some(thread::current().id())
    }
}

/// RAII guard for [`ProducerLock`]; releases on drop.
///
/// The guard is tied to the acquiring thread and cannot be sent elsewhere.
#[must_use = "the producer lock is released as soon as the guard is dropped"]
pub struct ProducerGuard<'a> {
    lock: &'a ProducerLock,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl ProducerGuard<'_> {
    /// Releases the lock now, reporting misuse instead of swallowing it.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for ProducerGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.lock.release() {
                log::debug!("Producer guard dropped without holding the lock: {}", err);
            }
        }
    }
}
