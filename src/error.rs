use thiserror::Error;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Error)]
pub enum RingQueueError {
    #[error("ring queue is full")]
    FullQueue,
    #[error("ring queue is empty")]
    EmptyQueue,
    #[error("ring queue is closed")]
    Closed,
    #[error("pop deadline exceeded")]
    DeadlineExceeded,
    #[error("operation not supported by this queue configuration")]
    Unsupported,
}

impl RingQueueError {
    /// Whether the same call may succeed later without reconfiguring the queue.
    ///
    /// `FullQueue`, `EmptyQueue` and `DeadlineExceeded` describe transient queue state.
    /// `Closed` and `Unsupported` are permanent for the queue instance that returned them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RingQueueError::FullQueue | RingQueueError::EmptyQueue | RingQueueError::DeadlineExceeded
        )
    }
}
