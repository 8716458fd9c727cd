//! Fixed-capacity event history

use std::collections::VecDeque;

/// Ring buffer that evicts the oldest item once full
#[derive(Debug, Clone)]
pub struct EventHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> EventHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, dropping the oldest one if the buffer is full
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Up to `count` most recent items, oldest first
    pub fn recent(&self, count: usize) -> Vec<T> {
        let start = self.items.len().saturating_sub(count);
        self.items.iter().skip(start).cloned().collect()
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

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
