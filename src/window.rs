//! Fixed-capacity FIFO of recent temperature samples, oldest first.

use crate::types::MAX_WINDOW_CAPACITY;
use heapless::{Deque, Vec};
use log::debug;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: Deque<f32, MAX_WINDOW_CAPACITY>,
    capacity: usize,
}

impl SlidingWindow {
    /// Capacity is clamped to `1..=MAX_WINDOW_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Deque::new(),
            capacity: capacity.clamp(1, MAX_WINDOW_CAPACITY),
        }
    }

    pub fn push(&mut self, sample: f32) {
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Cannot fail: a slot was freed above when the deque was full.
        let _ = self.samples.push_back(sample);
        self.evict_overflow();
    }

    pub fn drain(&mut self) {
        if !self.samples.is_empty() {
            debug!("Draining {} samples from trend window", self.samples.len());
        }
        self.samples.clear();
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.clamp(1, MAX_WINDOW_CAPACITY);
        self.evict_overflow();
    }

    fn evict_overflow(&mut self) {
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<f32, MAX_WINDOW_CAPACITY> {
        self.samples.iter().copied().collect()
    }

    pub fn oldest(&self) -> Option<f32> {
        self.samples.front().copied()
    }

    pub fn newest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_evicts_oldest_when_full() {
        let mut window = SlidingWindow::new(3);
        for sample in [98.0, 98.5, 99.0, 99.5] {
            window.push(sample);
        }
        assert_eq!(window.snapshot().as_slice(), &[98.5, 99.0, 99.5]);
        assert_eq!(window.oldest(), Some(98.5));
        assert_eq!(window.newest(), Some(99.5));
    }

    #[test]
    fn test_drain_empties_window() {
        let mut window = SlidingWindow::new(10);
        window.push(100.0);
        window.push(100.2);
        window.drain();
        assert!(window.is_empty());
        assert_eq!(window.oldest(), None);
    }

    #[test]
    fn test_shrinking_capacity_keeps_newest() {
        let mut window = SlidingWindow::new(10);
        for i in 0..8 {
            window.push(i as f32);
        }
        window.set_capacity(3);
        assert_eq!(window.snapshot().as_slice(), &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_capacity_is_clamped() {
        assert_eq!(SlidingWindow::new(0).capacity(), 1);
        assert_eq!(SlidingWindow::new(100).capacity(), MAX_WINDOW_CAPACITY);
    }

    proptest! {
        #[test]
        fn prop_length_never_exceeds_capacity(
            capacity in 1usize..=MAX_WINDOW_CAPACITY,
            samples in proptest::collection::vec(60.0f32..110.0, 0..64),
        ) {
            let mut window = SlidingWindow::new(capacity);
            for (i, sample) in samples.iter().enumerate() {
                window.push(*sample);
                prop_assert!(window.len() <= capacity);
                prop_assert_eq!(window.newest(), Some(*sample));
                prop_assert_eq!(window.len(), (i + 1).min(capacity));
            }
            window.drain();
            prop_assert_eq!(window.len(), 0);
        }
    }
}
