// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The emitted-row queue: a bounded FIFO shared between the spider's worker
//! threads (producers, via `emit_row`) and the supervisory loop (consumer,
//! via `drain_all`). Pushing onto a full queue blocks the calling thread —
//! that block, not anything in the Monitor, is the system's sole backpressure
//! mechanism.

use parking_lot::{Condvar, Mutex};
use spiderd_core::store::Row;
use std::collections::VecDeque;

pub struct EmittedRowQueue {
    capacity: usize,
    inner: Mutex<VecDeque<(String, Row)>>,
    not_full: Condvar,
}

impl EmittedRowQueue {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, inner: Mutex::new(VecDeque::new()), not_full: Condvar::new() }
    }

    /// Blocks while the queue is at capacity.
    pub fn push(&self, table: String, row: Row) {
        let mut guard = self.inner.lock();
        while guard.len() >= self.capacity {
            self.not_full.wait(&mut guard);
        }
        guard.push_back((table, row));
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Remove every buffered row, in FIFO order, and wake any blocked
    /// producers.
    pub fn drain_all(&self) -> Vec<(String, Row)> {
        let mut guard = self.inner.lock();
        let drained: Vec<_> = guard.drain(..).collect();
        drop(guard);
        self.not_full.notify_all();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn row(x: i64) -> Row {
        Row::from([("x".to_string(), json!(x))])
    }

    #[test]
    fn push_then_drain_preserves_fifo_order() {
        let queue = EmittedRowQueue::new(4);
        queue.push("t".to_string(), row(1));
        queue.push("t".to_string(), row(2));
        let drained = queue.drain_all();
        assert_eq!(drained, vec![("t".to_string(), row(1)), ("t".to_string(), row(2))]);
    }

    #[test]
    fn drain_empties_the_queue() {
        let queue = EmittedRowQueue::new(4);
        queue.push("t".to_string(), row(1));
        queue.drain_all();
        assert!(queue.is_empty());
    }

    #[test]
    fn push_blocks_until_drained() {
        let queue = Arc::new(EmittedRowQueue::new(1));
        queue.push("t".to_string(), row(1));
        assert!(queue.is_full());

        let pusher = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.push("t".to_string(), row(2)))
        };

        // Give the pusher a chance to block on the full queue before draining.
        std::thread::sleep(std::time::Duration::from_millis(50));
        let drained = queue.drain_all();
        pusher.join().unwrap();

        assert_eq!(drained, vec![("t".to_string(), row(1))]);
        assert_eq!(queue.drain_all(), vec![("t".to_string(), row(2))]);
    }
}
