use std::fmt;
use std::str::FromStr;

use crate::{RingQueueError, utils};

/// What `push` does when every slot is occupied.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum WhenFull {
    /// Reject the element with `RingQueueError::FullQueue`.
    #[default]
    Error,
    /// Replace the oldest element.
    Overwrite,
}

/// What `pop` does when no element is queued.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum WhenEmpty {
    /// Return `RingQueueError::EmptyQueue` immediately.
    #[default]
    Error,
    /// Wait for a push, the pop deadline, or close.
    Block,
}

impl FromStr for WhenFull {
    type Err = RingQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(WhenFull::Error),
            "overwrite" => Ok(WhenFull::Overwrite),
            _ => Err(RingQueueError::Unsupported),
        }
    }
}

impl FromStr for WhenEmpty {
    type Err = RingQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(WhenEmpty::Error),
            "block" => Ok(WhenEmpty::Block),
            _ => Err(RingQueueError::Unsupported),
        }
    }
}

impl fmt::Display for WhenFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhenFull::Error => f.write_str("error"),
            WhenFull::Overwrite => f.write_str("overwrite"),
        }
    }
}

impl fmt::Display for WhenEmpty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhenEmpty::Error => f.write_str("error"),
            WhenEmpty::Block => f.write_str("block"),
        }
    }
}

/// Callback receiving the final state of a queue when it is closed.
pub type OnClose<T> = Box<dyn FnOnce(ClosedRing<T>) + Send>;

/// Raw state of a ring queue at the moment it was closed.
///
/// Handed by value to the [`OnClose`] finalizer. Occupied slots are `Some`, free slots `None`.
#[derive(Debug)]
pub struct ClosedRing<T> {
    pub data: Box<[Option<T>]>,
    pub start: usize,
    pub end: usize,
    pub is_full: bool,
}

impl<T> ClosedRing<T> {
    /// Number of elements that were still queued at close.
    pub fn len(&self) -> usize {
        if self.data.is_empty() {
            return 0;
        }
        utils::occupied(self.start, self.end, self.is_full, self.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the elements that were still queued, oldest first.
    ///
    /// # Examples
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use ring_queue::{RingQueue, RingQueueOptions};
    ///
    /// let leftovers = Arc::new(Mutex::new(Vec::<i32>::new()));
    /// let sink = Arc::clone(&leftovers);
    /// let options = RingQueueOptions::<i32>::new(4)
    ///     .on_close(move |ring| sink.lock().unwrap().extend(ring.into_remaining()));
    ///
    /// let mut queue = RingQueue::with_options(options).unwrap();
    /// for value in 1..=3 {
    ///     queue.push(value).unwrap();
    /// }
    /// queue.pop().unwrap();
    /// queue.close().unwrap();
    ///
    /// assert_eq!(*leftovers.lock().unwrap(), vec![2, 3]);
    /// ```
    pub fn into_remaining(self) -> Vec<T> {
        let len = self.len();
        let mut slots = self.data.into_vec();
        if !slots.is_empty() {
            slots.rotate_left(self.start);
        }
        slots.into_iter().take(len).flatten().collect()
    }
}

/// Construction parameters shared by [`RingQueue`](crate::RingQueue) and the blocking wrapper.
pub struct RingQueueOptions<T> {
    pub capacity: usize,
    pub when_full: WhenFull,
    pub when_empty: WhenEmpty,
    pub on_close: Option<OnClose<T>>,
}

impl<T> RingQueueOptions<T> {
    /// Options for a queue of `capacity` slots with `Error` policies and no finalizer.
    pub fn new(capacity: usize) -> Self {
        RingQueueOptions {
            capacity,
            when_full: WhenFull::default(),
            when_empty: WhenEmpty::default(),
            on_close: None,
        }
    }

    pub fn when_full(mut self, when_full: WhenFull) -> Self {
        self.when_full = when_full;
        self
    }

    pub fn when_empty(mut self, when_empty: WhenEmpty) -> Self {
        self.when_empty = when_empty;
        self
    }

    /// Install a finalizer invoked exactly once when the queue closes.
    pub fn on_close<F>(mut self, on_close: F) -> Self
    where
        F: FnOnce(ClosedRing<T>) + Send + 'static,
    {
        self.on_close = Some(Box::new(on_close));
        self
    }
}

impl<T> fmt::Debug for RingQueueOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingQueueOptions")
            .field("capacity", &self.capacity)
            .field("when_full", &self.when_full)
            .field("when_empty", &self.when_empty)
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parsing() {
        assert_eq!("error".parse::<WhenFull>(), Ok(WhenFull::Error));
        assert_eq!(" Overwrite ".parse::<WhenFull>(), Ok(WhenFull::Overwrite));
        assert_eq!("block".parse::<WhenFull>(), Err(RingQueueError::Unsupported));

        assert_eq!("ERROR".parse::<WhenEmpty>(), Ok(WhenEmpty::Error));
        assert_eq!("block".parse::<WhenEmpty>(), Ok(WhenEmpty::Block));
        assert_eq!("wait".parse::<WhenEmpty>(), Err(RingQueueError::Unsupported));

        for policy in [WhenFull::Error, WhenFull::Overwrite] {
            assert_eq!(policy.to_string().parse::<WhenFull>(), Ok(policy));
        }
        for policy in [WhenEmpty::Error, WhenEmpty::Block] {
            assert_eq!(policy.to_string().parse::<WhenEmpty>(), Ok(policy));
        }
    }

    #[test]
    fn options_builder() {
        let options = RingQueueOptions::<u8>::new(16)
            .when_full(WhenFull::Overwrite)
            .when_empty(WhenEmpty::Block)
            .on_close(|_| {});

        assert_eq!(options.capacity, 16);
        assert_eq!(options.when_full, WhenFull::Overwrite);
        assert_eq!(options.when_empty, WhenEmpty::Block);
        assert!(options.on_close.is_some());
        assert_eq!(
            format!("{options:?}"),
            "RingQueueOptions { capacity: 16, when_full: Overwrite, when_empty: Block, on_close: true }"
        );
    }

    #[test]
    fn closed_ring_remaining_wraps() {
        // slots 3, 0, 1 are occupied; 2 is free
        let ring = ClosedRing {
            data: vec![Some(20), Some(30), None, Some(10)].into_boxed_slice(),
            start: 3,
            end: 2,
            is_full: false,
        };
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.into_remaining(), vec![10, 20, 30]);

        let full = ClosedRing {
            data: vec![Some(3), Some(1), Some(2)].into_boxed_slice(),
            start: 1,
            end: 1,
            is_full: true,
        };
        assert_eq!(full.len(), 3);
        assert_eq!(full.into_remaining(), vec![1, 2, 3]);

        let empty: ClosedRing<u8> = ClosedRing {
            data: Box::default(),
            start: 0,
            end: 0,
            is_full: false,
        };
        assert!(empty.is_empty());
        assert!(empty.into_remaining().is_empty());
    }
}
