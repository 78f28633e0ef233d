//! Shared FIFO of pending orders.
//!
//! One queue serves every strategy. Orders submitted during tick N are
//! drained and settled at tick N+1.

use lab_core::Order;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Mutex-guarded FIFO order buffer.
#[derive(Debug, Default)]
pub struct OrderQueue {
    pending: Mutex<VecDeque<Order>>,
}

impl OrderQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an order. Never blocks beyond the lock hand-off.
    pub fn enqueue(&self, order: Order) {
        self.pending.lock().push_back(order);
    }

    /// Atomically remove and return everything queued, in submission order.
    ///
    /// An `enqueue` racing with the drain lands either in this batch or the
    /// next one.
    pub fn drain_all(&self) -> Vec<Order> {
        let drained = std::mem::take(&mut *self.pending.lock());
        drained.into()
    }

    /// Number of pending orders.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
