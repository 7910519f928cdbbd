//! Fixed-capacity, thread-safe FIFO ring buffer.
//!
//! A single mutex guards all state; the critical section never does more
//! than pointer arithmetic, so `add` and `get_recent` are effectively O(1)
//! and never block on anything but the lock itself.

use parking_lot::Mutex;

struct Inner<T> {
    slots: Vec<Option<T>>,
    /// Index of the oldest element.
    head: usize,
    /// Number of live elements, `0..=capacity`.
    len: usize,
    dropped: u64,
}

/// Fixed-capacity FIFO with O(1) add, oldest-evict, and a monotonic drop
/// counter.
pub struct CircularBuffer<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> CircularBuffer<T> {
    /// Panics if `capacity == 0` — a zero-capacity ring buffer can never
    /// hold an element, which is a programmer error, not a runtime one.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CircularBuffer capacity must be > 0");
        Self {
            capacity,
            inner: Mutex::new(Inner {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                len: 0,
                dropped: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.inner.lock().len
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().dropped
    }

    /// Adds `item`, evicting the oldest element if full. Returns `true` if
    /// an element was evicted to make room.
    pub fn add(&self, item: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.len == self.capacity {
            let head = inner.head;
            inner.slots[head] = Some(item);
            inner.head = (head + 1) % self.capacity;
            inner.dropped += 1;
            true
        } else {
            let idx = (inner.head + inner.len) % self.capacity;
            inner.slots[idx] = Some(item);
            inner.len += 1;
            false
        }
    }

    /// Returns the most recent `min(n, count)` items, oldest-to-newest.
    pub fn get_recent(&self, n: usize) -> Vec<T> {
        let inner = self.inner.lock();
        let take = n.min(inner.len);
        let start = (inner.head + inner.len - take) % self.capacity;
        (0..take)
            .map(|i| {
                let idx = (start + i) % self.capacity;
                inner.slots[idx]
                    .clone()
                    .expect("ring slot within [head, head+len) must be populated")
            })
            .collect()
    }

    /// Empties the buffer without touching the drop counter.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.iter_mut() {
            *slot = None;
        }
        inner.head = 0;
        inner.len = 0;
    }

    /// Empties the buffer and zeros the drop counter.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.iter_mut() {
            *slot = None;
        }
        inner.head = 0;
        inner.len = 0;
        inner.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_under_capacity_never_drops() {
        let buf = CircularBuffer::new(4);
        assert!(!buf.add(1));
        assert!(!buf.add(2));
        assert_eq!(buf.count(), 2);
        assert_eq!(buf.dropped_count(), 0);
    }

    #[test]
    fn add_over_capacity_evicts_oldest() {
        let buf = CircularBuffer::new(3);
        for i in 1..=5 {
            buf.add(i);
        }
        assert_eq!(buf.count(), 3);
        assert_eq!(buf.dropped_count(), 2);
        assert_eq!(buf.get_recent(10), vec![3, 4, 5]);
    }

    #[test]
    fn get_recent_caps_at_n() {
        let buf = CircularBuffer::new(5);
        for i in 1..=5 {
            buf.add(i);
        }
        assert_eq!(buf.get_recent(2), vec![4, 5]);
        assert_eq!(buf.get_recent(0), Vec::<i32>::new());
    }

    #[test]
    fn get_recent_chronological_order_after_wraparound() {
        let buf = CircularBuffer::new(3);
        for i in 1..=7 {
            buf.add(i);
        }
        // capacity 3, 7 adds -> holds {5,6,7}
        assert_eq!(buf.get_recent(3), vec![5, 6, 7]);
    }

    #[test]
    fn clear_keeps_dropped_count() {
        let buf = CircularBuffer::new(2);
        for i in 1..=4 {
            buf.add(i);
        }
        assert_eq!(buf.dropped_count(), 2);
        buf.clear();
        assert_eq!(buf.count(), 0);
        assert_eq!(buf.dropped_count(), 2);
        assert!(buf.get_recent(10).is_empty());
    }

    #[test]
    fn reset_zeroes_dropped_count() {
        let buf = CircularBuffer::new(2);
        for i in 1..=4 {
            buf.add(i);
        }
        buf.reset();
        assert_eq!(buf.count(), 0);
        assert_eq!(buf.dropped_count(), 0);
    }

    #[test]
    fn invariant_drop_count_matches_formula() {
        let capacity = 4usize;
        let buf = CircularBuffer::new(capacity);
        let total_adds = 10usize;
        for i in 0..total_adds {
            buf.add(i);
        }
        assert_eq!(buf.dropped_count() as usize, total_adds - capacity);
        assert_eq!(buf.count(), capacity.min(total_adds));
    }

    proptest::proptest! {
        #[test]
        fn prop_count_and_drops_match_formula(capacity in 1usize..32, adds in 0usize..200) {
            let buf = CircularBuffer::new(capacity);
            for i in 0..adds {
                buf.add(i);
            }
            let expected_dropped = adds.saturating_sub(capacity);
            let expected_count = capacity.min(adds);
            proptest::prop_assert_eq!(buf.dropped_count() as usize, expected_dropped);
            proptest::prop_assert_eq!(buf.count(), expected_count);
        }

        #[test]
        fn prop_get_recent_is_most_recent_and_ordered(capacity in 1usize..32, adds in 0usize..200, n in 0usize..50) {
            let buf = CircularBuffer::new(capacity);
            for i in 0..adds {
                buf.add(i);
            }
            let recent = buf.get_recent(n);
            let expected_len = n.min(capacity.min(adds));
            proptest::prop_assert_eq!(recent.len(), expected_len);
            if !recent.is_empty() {
                let last_added = adds - 1;
                let expected: Vec<usize> = ((last_added + 1 - expected_len)..=last_added).collect();
                proptest::prop_assert_eq!(recent, expected);
            }
        }
    }
}
