// In crates/simulator/src/result_log.rs

use core_types::SimulationResult;
use serde::Serialize;
use std::collections::VecDeque;

/// A bounded, newest-first log of executed actions.
#[derive(Debug, Clone, Serialize)]
pub struct ResultLog {
    entries: VecDeque<SimulationResult>,
    capacity: usize,
}

impl ResultLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Adds a result at the front, evicting the oldest entry once full.
    pub fn push(&mut self, result: SimulationResult) {
        self.entries.push_front(result);
        self.entries.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&SimulationResult> {
        self.entries.front()
    }

    /// Iterates newest first.
    pub fn iter(&self) -> impl Iterator<Item = &SimulationResult> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<SimulationResult> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
