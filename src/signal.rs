use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::trace;

use crate::RingQueueError;

/// Wake-up channel between pushers and blocked poppers.
///
/// Carries three pieces of state: a saturating "an element may be available" flag, the pop
/// deadline, and a one-way closed flag. The flag is a hint, not a reservation: a waiter that
/// consumes it must still re-check the queue.
pub trait Signal: Send + Sync {
    /// Set the pending flag if it is not already set and wake a waiter.
    ///
    /// # Errors
    /// `RingQueueError::Closed` once [`close`](Self::close) has been called.
    fn notify(&self) -> Result<(), RingQueueError>;

    /// Block until the pending flag can be consumed.
    ///
    /// # Errors
    /// `RingQueueError::Closed` when the signal is closed, `RingQueueError::DeadlineExceeded`
    /// when the armed deadline has passed. Closed wins over pending, pending wins over the
    /// deadline.
    fn wait(&self) -> Result<(), RingQueueError>;

    /// Replace the deadline; `None` waits indefinitely. Wakes every waiter.
    fn set_deadline(&self, deadline: Option<Instant>);

    /// Close the signal and wake every waiter. Returns `true` only for the first call.
    fn close(&self) -> bool;

    fn is_closed(&self) -> bool;
}

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    closed: bool,
    deadline: Option<Instant>,
}

/// [`Signal`] built from a `Mutex` and a `Condvar`.
#[derive(Debug, Default)]
pub struct CondvarSignal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl CondvarSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        // the state is a handful of plain fields, a panicking holder cannot leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Signal for CondvarSignal {
    fn notify(&self) -> Result<(), RingQueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(RingQueueError::Closed);
        }
        if !state.pending {
            state.pending = true;
            drop(state);
            self.condvar.notify_one();
        }
        Ok(())
    }

    fn wait(&self) -> Result<(), RingQueueError> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(RingQueueError::Closed);
            }
            if state.pending {
                state.pending = false;
                return Ok(());
            }

            let deadline = state.deadline;
            state = match deadline {
                None => self
                    .condvar
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    // wait_timeout may return early; the loop re-checks against the instant
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RingQueueError::DeadlineExceeded);
                    }
                    let (guard, _) = self
                        .condvar
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    guard
                }
            };
            trace!("signal waiter woke");
        }
    }

    fn set_deadline(&self, deadline: Option<Instant>) {
        self.lock().deadline = deadline;
        self.condvar.notify_all();
    }

    fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);
        self.condvar.notify_all();
        true
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
