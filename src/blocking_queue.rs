use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use tracing::{debug, trace};

use crate::{
    CondvarSignal, FifoQueue, RingQueue, RingQueueError, RingQueueOptions, Signal, WhenEmpty,
    WhenFull,
};

/// Thread-safe wrapper over [`RingQueue`] with blocking pops, a pop deadline and close.
///
/// Every buffer operation runs under one mutex. Under `WhenEmpty::Block`, successful pushes post
/// a notification on the signal `S`, and a pop that finds the queue empty waits on that signal
/// with the mutex released. The notification is a single saturating flag, so a woken popper
/// simply retries and goes back to waiting if another popper got there first.
///
/// Share between threads with an `Arc`; every method takes `&self`.
pub struct BlockingRingQueue<T, S: Signal = CondvarSignal> {
    queue: Mutex<RingQueue<T>>,
    signal: S,
    when_empty: WhenEmpty,
}

impl<T> BlockingRingQueue<T, CondvarSignal> {
    /// Create a queue with `capacity` slots and the given policies.
    ///
    /// # Arguments
    /// * `capacity` - Number of slots, fixed for the lifetime of the queue.
    /// * `when_full` - Behaviour of `push` once every slot is occupied.
    /// * `when_empty` - Whether `pop` fails or waits on an empty queue.
    ///
    /// # Errors
    /// `RingQueueError::Unsupported` when `capacity` is zero.
    ///
    /// # Examples
    /// ```
    /// # #[cfg(feature = "blocking")] {
    /// use std::sync::Arc;
    /// use std::thread;
    /// use ring_queue::{BlockingRingQueue, WhenEmpty, WhenFull};
    ///
    /// let queue = Arc::new(BlockingRingQueue::new(4, WhenFull::Error, WhenEmpty::Block).unwrap());
    ///
    /// let consumer = {
    ///     let queue = Arc::clone(&queue);
    ///     thread::spawn(move || queue.pop().map(|(value, _)| value))
    /// };
    ///
    /// queue.push(42).unwrap();
    /// assert_eq!(consumer.join().unwrap(), Ok(42));
    /// # }
    /// ```
    pub fn new(
        capacity: usize,
        when_full: WhenFull,
        when_empty: WhenEmpty,
    ) -> Result<Self, RingQueueError> {
        Self::with_options(
            RingQueueOptions::new(capacity)
                .when_full(when_full)
                .when_empty(when_empty),
        )
    }

    /// Create a queue from a full set of options, including an optional close finalizer.
    pub fn with_options(options: RingQueueOptions<T>) -> Result<Self, RingQueueError> {
        Self::with_signal(options, CondvarSignal::new())
    }
}

impl<T, S: Signal> BlockingRingQueue<T, S> {
    /// Create a queue that coordinates through the given signal implementation.
    ///
    /// # Errors
    /// `RingQueueError::Unsupported` when the capacity is zero.
    pub fn with_signal(options: RingQueueOptions<T>, signal: S) -> Result<Self, RingQueueError> {
        let queue = RingQueue::build(options.capacity, options.when_full, options.on_close)?;
        debug!(when_empty = %options.when_empty, "blocking ring queue created");

        Ok(BlockingRingQueue {
            queue: Mutex::new(queue),
            signal,
            when_empty: options.when_empty,
        })
    }

    fn lock(&self) -> MutexGuard<'_, RingQueue<T>> {
        // RingQueue never panics halfway through a mutation, so a poisoned guard is still consistent
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an element, waking a blocked popper under `WhenEmpty::Block`.
    ///
    /// # Returns
    /// `Ok` with the length after the push.
    ///
    /// # Errors
    /// Propagates `RingQueueError::FullQueue` and `RingQueueError::Closed` from the buffer.
    /// Also returns `RingQueueError::Closed` if the queue was closed between storing the element
    /// and posting the notification.
    pub fn push(&self, element: T) -> Result<usize, RingQueueError> {
        let len = self.lock().push(element)?;
        if self.when_empty == WhenEmpty::Block {
            self.signal.notify()?;
        }
        Ok(len)
    }

    /// Dequeue the oldest element.
    ///
    /// Under `WhenEmpty::Error` this never blocks. Under `WhenEmpty::Block` an empty queue makes
    /// the caller wait for a push, the pop deadline, or close.
    ///
    /// # Returns
    /// `Ok` with the element and the length after the pop.
    ///
    /// # Errors
    /// `RingQueueError::EmptyQueue` (non-blocking policy only), `RingQueueError::Closed`,
    /// `RingQueueError::DeadlineExceeded` when the armed deadline passes while waiting.
    ///
    /// # Examples
    /// ```
    /// # #[cfg(feature = "blocking")] {
    /// use std::time::{Duration, Instant};
    /// use ring_queue::{BlockingRingQueue, RingQueueError, WhenEmpty, WhenFull};
    ///
    /// let queue = BlockingRingQueue::<u8>::new(2, WhenFull::Error, WhenEmpty::Block).unwrap();
    /// queue
    ///     .set_pop_deadline(Some(Instant::now() + Duration::from_millis(5)))
    ///     .unwrap();
    /// assert_eq!(queue.pop(), Err(RingQueueError::DeadlineExceeded));
    /// # }
    /// ```
    pub fn pop(&self) -> Result<(T, usize), RingQueueError> {
        if self.when_empty == WhenEmpty::Error {
            return self.lock().pop();
        }

        loop {
            let attempt = self.lock().pop();
            match attempt {
                Ok((element, len)) => {
                    if len > 0 {
                        // the flag may have collapsed several pushes, pass the wake-up along
                        let _ = self.signal.notify();
                    }
                    return Ok((element, len));
                }
                Err(RingQueueError::EmptyQueue) => {}
                Err(e) => return Err(e),
            }

            self.signal.wait()?;
            trace!("blocked pop retrying");
        }
    }

    /// Copy of the oldest element with the current length. Never blocks.
    pub fn peek(&self) -> Result<(T, usize), RingQueueError>
    where
        T: Clone,
    {
        self.lock()
            .peek()
            .map(|(element, len)| (element.clone(), len))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn cap(&self) -> usize {
        self.lock().cap()
    }

    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    pub fn when_empty(&self) -> WhenEmpty {
        self.when_empty
    }

    /// Arm or clear the deadline for blocked pops.
    ///
    /// `Some(instant)` replaces any previous deadline; once it passes, every pop that finds the
    /// queue empty fails with `RingQueueError::DeadlineExceeded` until the deadline is replaced or
    /// cleared. `None` clears it. Pops that find an element still succeed.
    ///
    /// # Errors
    /// `RingQueueError::Unsupported` unless the queue was built with `WhenEmpty::Block`.
    pub fn set_pop_deadline(&self, deadline: Option<Instant>) -> Result<(), RingQueueError> {
        if self.when_empty != WhenEmpty::Block {
            return Err(RingQueueError::Unsupported);
        }
        debug!(
            remaining = ?deadline.map(|d| d.saturating_duration_since(Instant::now())),
            "pop deadline set"
        );
        self.signal.set_deadline(deadline);
        Ok(())
    }

    /// Close the queue.
    ///
    /// Wakes every blocked pop with `RingQueueError::Closed`, then closes the buffer, which runs
    /// the finalizer and releases storage. Repeated calls do nothing. Never fails.
    pub fn close(&self) -> Result<(), RingQueueError> {
        if self.signal.close() {
            debug!("blocking ring queue closing");
        }
        self.lock().close()
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }
}

impl<T: fmt::Debug, S: Signal> fmt::Display for BlockingRingQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.lock(), f)
    }
}

impl<T: fmt::Debug, S: Signal + fmt::Debug> fmt::Debug for BlockingRingQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingRingQueue")
            .field("queue", &self.queue)
            .field("signal", &self.signal)
            .field("when_empty", &self.when_empty)
            .finish()
    }
}

impl<T, S: Signal> FifoQueue<T> for BlockingRingQueue<T, S> {
    fn push(&mut self, element: T) -> Result<usize, RingQueueError> {
        BlockingRingQueue::push(self, element)
    }

    fn pop(&mut self) -> Result<(T, usize), RingQueueError> {
        BlockingRingQueue::pop(self)
    }

    fn peek(&self) -> Result<(T, usize), RingQueueError>
    where
        T: Clone,
    {
        BlockingRingQueue::peek(self)
    }

    fn len(&self) -> usize {
        BlockingRingQueue::len(self)
    }

    fn cap(&self) -> usize {
        BlockingRingQueue::cap(self)
    }

    fn close(&mut self) -> Result<(), RingQueueError> {
        BlockingRingQueue::close(self)
    }

    fn set_pop_deadline(&mut self, deadline: Option<Instant>) -> Result<(), RingQueueError> {
        BlockingRingQueue::set_pop_deadline(self, deadline)
    }
}
