/// Step a ring index forward by one, wrapping at `capacity`.
#[inline]
pub(crate) fn advance(index: usize, capacity: usize) -> usize {
    debug_assert!(index < capacity, "index out of range");
    let next = index + 1;
    if next == capacity { 0 } else { next }
}

/// Number of occupied slots for the given indices.
///
/// `start == end` is empty unless `is_full` says otherwise.
#[inline]
pub(crate) fn occupied(start: usize, end: usize, is_full: bool, capacity: usize) -> usize {
    if is_full {
        return capacity;
    }
    if end >= start {
        end - start
    } else {
        capacity - start + end
    }
}
