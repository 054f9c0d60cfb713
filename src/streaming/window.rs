//! Fixed-capacity sliding window with a stride-based inference trigger.
//!
//! The first push primes the window by replicating the item `capacity`
//! times so a prediction is possible immediately; afterwards each push
//! evicts the oldest item. A separate arrival counter decides when the
//! window is handed to inference.

use std::collections::VecDeque;

/// Ordered buffer of the most recent items, at most `capacity` long.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
    stride: usize,
    since_inference: usize,
}

impl<T: Clone> SlidingWindow<T> {
    /// Creates an empty window.
    ///
    /// `capacity` and `stride` are clamped to at least 1.
    pub fn new(capacity: usize, stride: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            stride: stride.max(1),
            since_inference: 0,
        }
    }

    /// Adds an item, priming the window on the first push.
    pub fn push(&mut self, item: T) {
        if self.items.is_empty() {
            self.items.extend(std::iter::repeat_n(item, self.capacity));
        } else {
            if self.items.len() == self.capacity {
                self.items.pop_front();
            }
            self.items.push_back(item);
        }
        self.since_inference += 1;
    }

    /// Returns true once `stride` pushes have happened since the last true.
    ///
    /// Resets the arrival counter when it fires.
    pub fn should_infer(&mut self) -> bool {
        if self.since_inference >= self.stride {
            self.since_inference = 0;
            true
        } else {
            false
        }
    }

    /// Ordered copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pushes counted since the last inference trigger.
    pub fn pending(&self) -> usize {
        self.since_inference
    }

    /// Empties the window and the arrival counter.
    pub fn clear(&mut self) {
        self.items.clear();
        self.since_inference = 0;
    }
}
