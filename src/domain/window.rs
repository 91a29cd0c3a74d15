//! Fixed-capacity sliding window of recent bars.

use std::collections::VecDeque;

use crate::domain::bar::Bar;
use crate::domain::error::BarwiseError;

#[derive(Debug, Clone)]
pub struct BarWindow {
    capacity: usize,
    bars: VecDeque<Bar>,
}

impl BarWindow {
    pub fn new(capacity: usize) -> Result<Self, BarwiseError> {
        if capacity == 0 {
            return Err(BarwiseError::UnsupportedConfig {
                reason: "window size must be at least 1".into(),
            });
        }
        Ok(BarWindow {
            capacity,
            bars: VecDeque::with_capacity(capacity),
        })
    }

    /// Append a bar, returning the evicted oldest bar when already full.
    pub fn push(&mut self, bar: Bar) -> Option<Bar> {
        let evicted = if self.bars.len() == self.capacity {
            self.bars.pop_front()
        } else {
            None
        };
        self.bars.push_back(bar);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bars.len() == self.capacity
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Bars oldest first.
    pub fn as_slice(&mut self) -> &[Bar] {
        self.bars.make_contiguous()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}
