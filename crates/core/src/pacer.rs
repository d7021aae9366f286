//! Outbound frame queue drained at a fixed cadence.
//!
//! The assistant produces audio in bursts that are often far ahead of real
//! time. Frames are parked here and released one per tick so the telephony
//! leg sees a steady 20 ms cadence. The queue is bounded: when full, the
//! oldest frame is discarded to keep latency from growing without limit.

use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;

pub const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Five seconds of 20 ms frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 250;

#[derive(Debug)]
pub struct PacedQueue {
    frames: VecDeque<Bytes>,
    capacity: usize,
    dropped: u64,
}

impl PacedQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    /// Appends a frame, evicting the oldest one if the queue is full.
    /// Returns `true` when a frame was evicted.
    pub fn push(&mut self, frame: Bytes) -> bool {
        let evicted = if self.frames.len() >= self.capacity {
            self.frames.pop_front();
            self.dropped += 1;
            true
        } else {
            false
        };
        self.frames.push_back(frame);
        evicted
    }

    /// Takes the frame due on this tick, if any.
    pub fn pop(&mut self) -> Option<Bytes> {
        self.frames.pop_front()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for PacedQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> Bytes {
        Bytes::from(vec![tag; 4])
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PacedQueue::default();
        queue.push(frame(1));
        queue.push(frame(2));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(frame(1)));
        assert_eq!(queue.pop(), Some(frame(2)));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let mut queue = PacedQueue::new(3);
        for tag in 0..3 {
            assert!(!queue.push(frame(tag)));
        }
        assert!(queue.push(frame(3)));
        assert!(queue.push(frame(4)));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.pop(), Some(frame(2)));
    }

    #[test]
    fn test_zero_capacity_still_holds_one_frame() {
        let mut queue = PacedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(frame(1));
        queue.push(frame(2));
        assert_eq!(queue.pop(), Some(frame(2)));
    }
}
