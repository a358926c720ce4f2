//! Bounded FIFO of decoded video frames awaiting presentation.
//!
//! The jitter buffer for the video track: absorbs variable arrival
//! timing so presentation decisions can be made against timestamps.
//! Its consumer (the presentation loop) is not real-time, so a plain
//! mutex is fine here. Timestamps are assumed non-decreasing in
//! arrival order — enforced by the sender, not re-validated here.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;

/// One decoded frame with its capture timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub pts_ns: u64,
    pub data: Bytes,
}

/// Single-producer single-consumer frame queue, bounded.
///
/// On overflow the oldest frame is dropped, keeping the queue biased
/// toward fresh frames when decode outpaces presentation.
#[derive(Debug)]
pub struct VideoQueue {
    frames: Mutex<VecDeque<VideoFrame>>,
    capacity: usize,
    overflow_dropped: AtomicU64,
}

impl VideoQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be nonzero");
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            overflow_dropped: AtomicU64::new(0),
        }
    }

    /// Append a frame, evicting the oldest if the queue is full.
    pub fn push(&self, frame: VideoFrame) {
        let mut frames = self.frames.lock().unwrap();
        if frames.len() == self.capacity {
            frames.pop_front();
            self.overflow_dropped.fetch_add(1, Ordering::Relaxed);
        }
        frames.push_back(frame);
    }

    /// Drop head frames with `pts < cutoff_ns`, returning how many.
    pub fn drop_older_than(&self, cutoff_ns: u64) -> u64 {
        let mut frames = self.frames.lock().unwrap();
        let mut dropped = 0;
        while frames.front().is_some_and(|f| f.pts_ns < cutoff_ns) {
            frames.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Pop the head frame if its `pts <= deadline_ns`.
    pub fn pop_due(&self, deadline_ns: u64) -> Option<VideoFrame> {
        let mut frames = self.frames.lock().unwrap();
        if frames.front().is_some_and(|f| f.pts_ns <= deadline_ns) {
            frames.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames evicted because the queue was full.
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped.load(Ordering::Relaxed)
    }

    /// Discard everything.
    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pts_ns: u64) -> VideoFrame {
        VideoFrame {
            pts_ns,
            data: Bytes::from_static(&[0xab]),
        }
    }

    #[test]
    fn fifo_order() {
        let q = VideoQueue::new(8);
        q.push(frame(10));
        q.push(frame(20));
        q.push(frame(30));

        assert_eq!(q.pop_due(u64::MAX).unwrap().pts_ns, 10);
        assert_eq!(q.pop_due(u64::MAX).unwrap().pts_ns, 20);
        assert_eq!(q.pop_due(u64::MAX).unwrap().pts_ns, 30);
        assert!(q.pop_due(u64::MAX).is_none());
    }

    #[test]
    fn overflow_evicts_oldest_without_blocking() {
        let q = VideoQueue::new(4);
        for pts in 0..6 {
            q.push(frame(pts));
        }

        assert_eq!(q.len(), 4);
        assert_eq!(q.overflow_dropped(), 2);
        // Oldest two (0, 1) are gone; head is now 2.
        assert_eq!(q.pop_due(u64::MAX).unwrap().pts_ns, 2);
    }

    #[test]
    fn drop_older_than_stops_at_first_fresh_frame() {
        let q = VideoQueue::new(8);
        q.push(frame(10));
        q.push(frame(20));
        q.push(frame(30));

        assert_eq!(q.drop_older_than(25), 2);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(u64::MAX).unwrap().pts_ns, 30);
    }

    #[test]
    fn pop_due_respects_deadline() {
        let q = VideoQueue::new(8);
        q.push(frame(100));

        assert!(q.pop_due(99).is_none());
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(100).unwrap().pts_ns, 100);
    }

    #[test]
    fn clear_empties_queue() {
        let q = VideoQueue::new(8);
        q.push(frame(1));
        q.push(frame(2));
        q.clear();
        assert!(q.is_empty());
        assert!(q.pop_due(u64::MAX).is_none());
    }
}
