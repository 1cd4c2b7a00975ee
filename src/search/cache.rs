//! Fitness memo keyed by the refactoring series itself.

use std::collections::HashMap;

use super::Gene;
use crate::core::Result;

/// Remembers the fitness of every series evaluated in one search run.
#[derive(Debug, Default)]
pub struct FitnessCache {
    entries: HashMap<Vec<Gene>, f64>,
    hits: u64,
    misses: u64,
}

impl FitnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached fitness of `series`, computing and storing it on a miss.
    pub fn get_or_try_insert_with<F>(&mut self, series: &[Gene], compute: F) -> Result<f64>
    where
        F: FnOnce() -> Result<f64>,
    {
        if let Some(&fitness) = self.entries.get(series) {
            self.hits += 1;
            return Ok(fitness);
        }
        let fitness = compute()?;
        self.misses += 1;
        self.entries.insert(series.to_vec(), fitness);
        Ok(fitness)
    }

    pub fn get(&self, series: &[Gene]) -> Option<f64> {
        self.entries.get(series).copied()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zero the hit and miss counters, keeping the entries.
    pub fn reset_counters(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.reset_counters();
    }
}
