//! Synchronized work queue between pipeline stages.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Bounded, wake-on-signal FIFO handoff queue.
///
/// `push` never blocks: when a capacity is set and reached, the oldest
/// entry is dropped (downstream frame-drop semantics already exist, so
/// shedding the stalest work is safe). `acquire` blocks until the queue
/// is non-empty or the stop predicate fires, draining the whole backlog
/// in one atomic operation.
#[derive(Debug)]
pub struct SyncedQueue<T> {
    inner: Mutex<VecDeque<T>>,
    signal: Condvar,
    capacity: Option<usize>,
}

impl<T> Default for SyncedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncedQueue<T> {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            signal: Condvar::new(),
            capacity: None,
        }
    }

    /// Create a queue that sheds the oldest entry beyond `capacity`.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            signal: Condvar::new(),
            capacity: Some(capacity),
        }
    }

    /// Enqueue an item and wake one waiter. Never blocks.
    pub fn push(&self, item: T) {
        let mut queue = self.inner.lock().expect("queue poisoned");
        if let Some(capacity) = self.capacity {
            while queue.len() >= capacity {
                queue.pop_front();
            }
        }
        queue.push_back(item);
        drop(queue);
        self.signal.notify_one();
    }

    /// Block until the queue is non-empty or `stop` returns true,
    /// whichever first, draining the entire backlog.
    ///
    /// An empty result means the stop predicate fired.
    pub fn acquire<F: Fn() -> bool>(&self, stop: F) -> VecDeque<T> {
        let mut queue = self.inner.lock().expect("queue poisoned");
        loop {
            if stop() {
                return VecDeque::new();
            }
            if !queue.is_empty() {
                return std::mem::take(&mut *queue);
            }
            queue = self.signal.wait(queue).expect("queue poisoned");
        }
    }

    /// Wake all waiters so they re-check their stop predicate.
    pub fn notify(&self) {
        self.signal.notify_all();
    }

    /// Current backlog length.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue poisoned").len()
    }

    /// Check if the backlog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_drains_batch_in_order() {
        let queue = SyncedQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        let batch = queue.acquire(|| false);
        assert_eq!(batch, VecDeque::from(vec![1, 2, 3]));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let queue = SyncedQueue::bounded(2);
        queue.push(1);
        queue.push(2);
        queue.push(3);

        let batch = queue.acquire(|| false);
        assert_eq!(batch, VecDeque::from(vec![2, 3]));
    }

    #[test]
    fn test_stop_returns_empty() {
        let queue: SyncedQueue<i32> = SyncedQueue::new();
        let batch = queue.acquire(|| true);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_wakes_blocked_consumer_on_push() {
        let queue = Arc::new(SyncedQueue::new());
        let consumer_queue = queue.clone();

        let handle = std::thread::spawn(move || consumer_queue.acquire(|| false));

        std::thread::sleep(Duration::from_millis(20));
        queue.push(7);

        let batch = handle.join().unwrap();
        assert_eq!(batch, VecDeque::from(vec![7]));
    }

    #[test]
    fn test_notify_unblocks_on_stop() {
        let queue: Arc<SyncedQueue<i32>> = Arc::new(SyncedQueue::new());
        let stop = Arc::new(AtomicBool::new(false));

        let consumer_queue = queue.clone();
        let consumer_stop = stop.clone();
        let handle =
            std::thread::spawn(move || consumer_queue.acquire(|| consumer_stop.load(Ordering::Acquire)));

        std::thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::Release);
        queue.notify();

        let batch = handle.join().unwrap();
        assert!(batch.is_empty());
    }
}
