use std::fmt;
use std::time::Instant;

use tracing::{debug, trace};

use crate::queue_meta::{ClosedRing, OnClose, RingQueueOptions, WhenEmpty, WhenFull};
use crate::{RingQueueError, utils};

/// Operations shared by [`RingQueue`] and the blocking wrapper, so callers can be generic over
/// single-threaded and shared queues.
pub trait FifoQueue<T> {
    /// Enqueue `element`, returning the new length.
    fn push(&mut self, element: T) -> Result<usize, RingQueueError>;

    /// Dequeue the oldest element, returning it with the new length.
    fn pop(&mut self) -> Result<(T, usize), RingQueueError>;

    /// Copy of the oldest element with the current length.
    fn peek(&self) -> Result<(T, usize), RingQueueError>
    where
        T: Clone;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cap(&self) -> usize;

    fn close(&mut self) -> Result<(), RingQueueError>;

    /// Arm (`Some`) or clear (`None`) the deadline for blocked pops.
    ///
    /// Queues that never block return `RingQueueError::Unsupported`.
    fn set_pop_deadline(&mut self, _deadline: Option<Instant>) -> Result<(), RingQueueError> {
        Err(RingQueueError::Unsupported)
    }
}

/// Fixed-capacity circular FIFO over a boxed slice of slots.
///
/// `start` is the oldest occupied slot, `end` is one past the newest. Because `start == end`
/// holds both when empty and when full, `is_full` disambiguates. Nothing is shifted or
/// reallocated after construction.
pub struct RingQueue<T> {
    data: Box<[Option<T>]>,
    start: usize,
    end: usize,
    is_full: bool,
    when_full: WhenFull,
    closed: bool,
    on_close: Option<OnClose<T>>,
}

impl<T> RingQueue<T> {
    /// Create a queue with `capacity` slots and the given full policy.
    ///
    /// # Arguments
    /// * `capacity` - Number of slots, fixed for the lifetime of the queue.
    /// * `when_full` - Behaviour of `push` once every slot is occupied.
    ///
    /// # Returns
    /// `Ok(RingQueue)` or `Err(RingQueueError::Unsupported)` when `capacity` is zero.
    ///
    /// # Examples
    /// ```
    /// use ring_queue::{RingQueue, WhenFull};
    ///
    /// let queue = RingQueue::<u32>::new(8, WhenFull::Error).unwrap();
    /// assert_eq!(queue.cap(), 8);
    /// assert_eq!(queue.len(), 0);
    /// ```
    pub fn new(capacity: usize, when_full: WhenFull) -> Result<RingQueue<T>, RingQueueError> {
        RingQueue::with_options(RingQueueOptions::new(capacity).when_full(when_full))
    }

    /// Create a queue from a full set of options.
    ///
    /// # Errors
    /// Returns `RingQueueError::Unsupported` when `options.when_empty` is `WhenEmpty::Block`
    /// (only the blocking wrapper can wait) or when the capacity is zero.
    pub fn with_options(options: RingQueueOptions<T>) -> Result<RingQueue<T>, RingQueueError> {
        if options.when_empty != WhenEmpty::Error {
            return Err(RingQueueError::Unsupported);
        }
        RingQueue::build(options.capacity, options.when_full, options.on_close)
    }

    /// Construct without looking at the empty policy; the blocking wrapper owns that decision.
    pub(crate) fn build(
        capacity: usize,
        when_full: WhenFull,
        on_close: Option<OnClose<T>>,
    ) -> Result<RingQueue<T>, RingQueueError> {
        if capacity == 0 {
            return Err(RingQueueError::Unsupported);
        }

        let data: Box<[Option<T>]> = std::iter::repeat_with(|| None).take(capacity).collect();
        debug!(capacity, %when_full, "ring queue created");

        Ok(RingQueue {
            data,
            start: 0,
            end: 0,
            is_full: false,
            when_full,
            closed: false,
            on_close,
        })
    }

    /// Enqueue an element at the end of the queue.
    ///
    /// Under `WhenFull::Overwrite` a push into a full queue replaces the oldest element and
    /// moves `start` along with `end`, so the length stays at capacity.
    ///
    /// # Returns
    /// `Ok` with the length after the push.
    ///
    /// # Errors
    /// `RingQueueError::Closed` after [`close`](Self::close), `RingQueueError::FullQueue` when
    /// full under `WhenFull::Error` (the element is dropped and the queue is unchanged).
    ///
    /// # Examples
    /// ```
    /// use ring_queue::{RingQueue, RingQueueError, WhenFull};
    ///
    /// let mut queue = RingQueue::new(2, WhenFull::Error).unwrap();
    /// assert_eq!(queue.push('a'), Ok(1));
    /// assert_eq!(queue.push('b'), Ok(2));
    /// assert_eq!(queue.push('c'), Err(RingQueueError::FullQueue));
    ///
    /// let mut ring = RingQueue::new(2, WhenFull::Overwrite).unwrap();
    /// for c in ['a', 'b', 'c'] {
    ///     ring.push(c).unwrap();
    /// }
    /// assert_eq!(ring.pop(), Ok(('b', 1)));
    /// ```
    pub fn push(&mut self, element: T) -> Result<usize, RingQueueError> {
        if self.closed {
            return Err(RingQueueError::Closed);
        }

        let capacity = self.data.len();
        if self.is_full {
            match self.when_full {
                WhenFull::Error => return Err(RingQueueError::FullQueue),
                WhenFull::Overwrite => {
                    // end == start here, so the slot about to be written holds the oldest element
                    trace!(index = self.start, "overwriting oldest element");
                    self.start = utils::advance(self.start, capacity);
                }
            }
        }

        self.data[self.end] = Some(element);
        self.end = utils::advance(self.end, capacity);
        self.is_full = self.end == self.start;

        Ok(self.len())
    }

    /// Dequeue the oldest element.
    ///
    /// # Returns
    /// `Ok` with the element and the length after the pop.
    ///
    /// # Errors
    /// `RingQueueError::Closed` after close, `RingQueueError::EmptyQueue` when nothing is queued.
    ///
    /// # Examples
    /// ```
    /// use ring_queue::{RingQueue, RingQueueError, WhenFull};
    ///
    /// let mut queue = RingQueue::new(4, WhenFull::Error).unwrap();
    /// assert_eq!(queue.pop(), Err(RingQueueError::EmptyQueue));
    /// queue.push(7).unwrap();
    /// queue.push(8).unwrap();
    /// assert_eq!(queue.pop(), Ok((7, 1)));
    /// ```
    pub fn pop(&mut self) -> Result<(T, usize), RingQueueError> {
        self.check_readable()?;

        let element = self.data[self.start]
            .take()
            .ok_or(RingQueueError::EmptyQueue)?;
        self.start = utils::advance(self.start, self.data.len());
        self.is_full = false;

        Ok((element, self.len()))
    }

    /// Borrow the oldest element without removing it.
    ///
    /// # Errors
    /// Same as [`pop`](Self::pop); the queue is never modified.
    pub fn peek(&self) -> Result<(&T, usize), RingQueueError> {
        self.check_readable()?;

        match &self.data[self.start] {
            Some(element) => Ok((element, self.len())),
            None => Err(RingQueueError::EmptyQueue),
        }
    }

    fn check_readable(&self) -> Result<(), RingQueueError> {
        if self.closed {
            return Err(RingQueueError::Closed);
        }
        if !self.is_full && self.start == self.end {
            return Err(RingQueueError::EmptyQueue);
        }
        Ok(())
    }

    /// Number of queued elements; 0 once closed.
    #[inline]
    pub fn len(&self) -> usize {
        if self.closed {
            return 0;
        }
        utils::occupied(self.start, self.end, self.is_full, self.data.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots; 0 once closed.
    #[inline]
    pub fn cap(&self) -> usize {
        if self.closed {
            return 0;
        }
        self.data.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        !self.closed && self.is_full
    }

    #[inline]
    pub fn when_full(&self) -> WhenFull {
        self.when_full
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the queue and release its storage.
    ///
    /// The first call hands the final state to the `on_close` finalizer, if any. Later calls do
    /// nothing. Never fails.
    ///
    /// # Examples
    /// ```
    /// use ring_queue::{RingQueue, RingQueueError, WhenFull};
    ///
    /// let mut queue = RingQueue::new(4, WhenFull::Error).unwrap();
    /// queue.push(1).unwrap();
    /// queue.close().unwrap();
    /// queue.close().unwrap();
    ///
    /// assert_eq!(queue.len(), 0);
    /// assert_eq!(queue.push(2), Err(RingQueueError::Closed));
    /// assert_eq!(queue.to_string(), "[RQ closed]");
    /// ```
    pub fn close(&mut self) -> Result<(), RingQueueError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let final_state = ClosedRing {
            data: std::mem::take(&mut self.data),
            start: self.start,
            end: self.end,
            is_full: self.is_full,
        };
        debug!(
            capacity = final_state.data.len(),
            remaining = final_state.len(),
            "ring queue closed"
        );

        // dropping final_state releases the store when there is no finalizer
        if let Some(on_close) = self.on_close.take() {
            on_close(final_state);
        }

        Ok(())
    }
}

impl<T> Drop for RingQueue<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl<T: fmt::Debug> fmt::Display for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.closed {
            return f.write_str("[RQ closed]");
        }
        write!(
            f,
            "[RQ full:{} size:{} start:{} end:{} data:{:?}]",
            self.is_full,
            self.data.len(),
            self.start,
            self.end,
            self.data
        )
    }
}

impl<T: fmt::Debug> fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingQueue")
            .field("data", &self.data)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("is_full", &self.is_full)
            .field("when_full", &self.when_full)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<T> FifoQueue<T> for RingQueue<T> {
    fn push(&mut self, element: T) -> Result<usize, RingQueueError> {
        RingQueue::push(self, element)
    }

    fn pop(&mut self) -> Result<(T, usize), RingQueueError> {
        RingQueue::pop(self)
    }

    fn peek(&self) -> Result<(T, usize), RingQueueError>
    where
        T: Clone,
    {
        RingQueue::peek(self).map(|(element, len)| (element.clone(), len))
    }

    fn len(&self) -> usize {
        RingQueue::len(self)
    }

    fn cap(&self) -> usize {
        RingQueue::cap(self)
    }

    fn close(&mut self) -> Result<(), RingQueueError> {
        RingQueue::close(self)
    }
}
