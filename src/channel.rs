//! Unbounded in-process message queue shared between relay tasks.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Opaque text payload relayed between peers.
pub type Message = String;

/// Unbounded FIFO queue with any number of producers and consumers.
///
/// `put` never suspends. `take` suspends while the queue is empty, and each
/// `put` satisfies exactly one suspended taker. A `take` dropped while
/// suspended never consumes a message, so relay tasks can be aborted at any
/// point without corrupting the queue.
#[derive(Debug)]
pub struct Channel<T = Message> {
    queue: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    // The lock is never held across an await, so a poisoned queue is still
    // structurally sound.
    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, item: T) {
        self.queue().push_back(item);
        self.available.notify_one();
    }

    pub async fn take(&self) -> T {
        loop {
            let next = self.queue().pop_front();
            if let Some(item) = next {
                return item;
            }
            self.available.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}
