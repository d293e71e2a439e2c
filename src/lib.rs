//! Fixed-capacity circular queue plus a thread-safe wrapper with blocking pops, a pop deadline
//! and graceful close.

/// the circular queue code
pub mod queue;
pub use queue::FifoQueue;
pub use queue::RingQueue;

/// Availability signal used by the blocking queue (optional feature)
#[cfg(feature = "blocking")]
pub mod signal;
#[cfg(feature = "blocking")]
pub use signal::{CondvarSignal, Signal};

/// Futex-backed availability signal (optional feature)
#[cfg(feature = "futex")]
pub mod futex_signal;
#[cfg(feature = "futex")]
pub use futex_signal::FutexSignal;

/// Blocking queue backed by Mutex and a pluggable signal (optional feature)
#[cfg(feature = "blocking")]
pub mod blocking_queue;
#[cfg(feature = "blocking")]
pub use blocking_queue::BlockingRingQueue;

/// [`BlockingRingQueue`] parking its waiters on a futex word.
#[cfg(feature = "futex")]
pub type FutexRingQueue<T> = BlockingRingQueue<T, FutexSignal>;

/// policies, construction options and the close finalizer types
pub mod queue_meta;
pub use queue_meta::{ClosedRing, OnClose, RingQueueOptions, WhenEmpty, WhenFull};

/// the errors
pub mod error;
pub use error::RingQueueError;

/// utils for internal usage
mod utils;
