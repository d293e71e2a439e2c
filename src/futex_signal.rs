use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use tracing::trace;
use wait_on_address::AtomicWait;

use crate::{RingQueueError, Signal};

const PENDING: u32 = 1;
const CLOSED: u32 = 1 << 1;
/// Added on every deadline change so parked waiters see the word move.
const EPOCH: u32 = 1 << 2;

/// Longest single park when no deadline is armed.
const IDLE_PARK: Duration = Duration::from_secs(1);

/// Futex-backed [`Signal`].
///
/// The pending and closed flags live in one [`AtomicU32`] together with an epoch counter.
/// Waiters park on the word with [`wait_on_address`], so any flag change or deadline update
/// wakes them. The deadline itself sits beside the word and is only read on the slow path.
#[derive(Debug, Default)]
pub struct FutexSignal {
    word: AtomicU32,
    deadline: Mutex<Option<Instant>>,
}

impl FutexSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Signal for FutexSignal {
    fn notify(&self) -> Result<(), RingQueueError> {
        let prev = self.word.fetch_or(PENDING, Ordering::AcqRel);
        if prev & CLOSED != 0 {
            return Err(RingQueueError::Closed);
        }
        if prev & PENDING == 0 {
            self.word.notify_all();
        }
        Ok(())
    }

    fn wait(&self) -> Result<(), RingQueueError> {
        loop {
            let value = self.word.load(Ordering::Acquire);
            if value & CLOSED != 0 {
                return Err(RingQueueError::Closed);
            }
            if value & PENDING != 0 {
                match self.word.compare_exchange(
                    value,
                    value & !PENDING,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Ok(()),
                    Err(_) => {
                        std::hint::spin_loop();
                        continue;
                    }
                }
            }

            // a deadline change after the load above bumps the epoch, so the park below
            // returns immediately instead of sleeping on a stale deadline
            let park_for = match self.deadline() {
                None => IDLE_PARK,
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining.min(IDLE_PARK),
                    _ => return Err(RingQueueError::DeadlineExceeded),
                },
            };
            self.word.wait_timeout(value, park_for);
            trace!("futex waiter woke");
        }
    }

    fn set_deadline(&self, deadline: Option<Instant>) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = deadline;
        self.word.fetch_add(EPOCH, Ordering::AcqRel);
        self.word.notify_all();
    }

    fn close(&self) -> bool {
        let prev = self.word.fetch_or(CLOSED, Ordering::AcqRel);
        self.word.notify_all();
        prev & CLOSED == 0
    }

    fn is_closed(&self) -> bool {
        self.word.load(Ordering::Acquire) & CLOSED != 0
    }
}
