//! Bounded FIFO of recent frames.

use std::collections::VecDeque;

use bytes::Bytes;

/// Sliding window of the most recent frames, oldest first.
///
/// Never holds more than `capacity` frames; pushing beyond that evicts from
/// the head.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    frames: VecDeque<Bytes>,
    capacity: usize,
}

impl FrameBuffer {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append to the tail and evict from the head down to capacity.
    /// Returns the number of evicted frames.
    pub fn push(&mut self, frame: Bytes) -> usize {
        self.frames.push_back(frame);
        let mut evicted = 0;
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// The trailing `min(n, len)` frames, oldest first.
    pub fn window(&self, n: usize) -> Vec<Bytes> {
        let skip = self.frames.len().saturating_sub(n);
        self.frames.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.frames.iter()
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(i: usize) -> Bytes {
        Bytes::from(format!("frame-{}", i))
    }

    #[test]
    fn test_retains_most_recent_frames_in_order() {
        for capacity in 1..=12 {
            for pushes in 0..=30 {
                let mut buffer = FrameBuffer::new(capacity);
                for i in 0..pushes {
                    buffer.push(frame(i));
                    assert!(buffer.len() <= capacity);
                }

                let expected: Vec<Bytes> =
                    (pushes.saturating_sub(capacity)..pushes).map(frame).collect();
                let retained: Vec<Bytes> = buffer.iter().cloned().collect();
                assert_eq!(retained, expected, "capacity {} pushes {}", capacity, pushes);
            }
        }
    }

    #[test]
    fn test_push_reports_evictions() {
        let mut buffer = FrameBuffer::new(2);
        assert_eq!(buffer.push(frame(0)), 0);
        assert_eq!(buffer.push(frame(1)), 0);
        assert_eq!(buffer.push(frame(2)), 1);
    }

    #[test]
    fn test_window_is_trailing_slice() {
        let mut buffer = FrameBuffer::new(9);
        for i in 0..9 {
            buffer.push(frame(i));
        }
        assert_eq!(buffer.window(6), (3..9).map(frame).collect::<Vec<_>>());
        assert_eq!(buffer.window(20).len(), 9);

        let mut short = FrameBuffer::new(9);
        short.push(frame(0));
        assert_eq!(short.window(6), vec![frame(0)]);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut buffer = FrameBuffer::new(0);
        buffer.push(frame(0));
        buffer.push(frame(1));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.window(1), vec![frame(1)]);
    }
}
