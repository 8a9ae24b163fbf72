// src/replay.rs
//
// Bounded experience replay with uniform sampling.
//
// Fixed-capacity ring over a VecDeque: pushing past capacity evicts the
// oldest item in O(1). Sampling draws a batch uniformly without replacement
// within a call, from a buffer-owned seeded RNG, so runs replay identically
// for identical seeds. Asking for more items than are present is a typed
// error the caller can treat as "not warmed up yet".

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{PrecisError, Result};

#[derive(Debug)]
pub struct ReplayBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    rng: ChaCha8Rng,
    total_pushed: u64,
}

impl<T: Clone> ReplayBuffer<T> {
    /// Create an empty buffer. Capacity must be positive.
    pub fn new(capacity: usize, seed: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(PrecisError::configuration("replay capacity must be > 0"));
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            rng: ChaCha8Rng::seed_from_u64(seed),
            total_pushed: 0,
        })
    }

    /// Insert an item, evicting the oldest when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
        self.total_pushed += 1;
    }

    /// Draw `batch_size` distinct items uniformly at random.
    ///
    /// Distinct within one call; separate calls may overlap. Fails with an
    /// insufficient-data error when the buffer holds fewer items.
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<T>> {
        if batch_size > self.items.len() {
            return Err(PrecisError::InsufficientData {
                available: self.items.len(),
                requested: batch_size,
            });
        }

        // Partial Fisher-Yates: only the first batch_size slots are settled.
        let mut indices: Vec<usize> = (0..self.items.len()).collect();
        for i in 0..batch_size {
            let j = self.rng.gen_range(i..indices.len());
            indices.swap(i, j);
        }

        Ok(indices[..batch_size]
            .iter()
            .map(|&i| self.items[i].clone())
            .collect())
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

    /// Items inserted over the buffer's lifetime, including evicted ones.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Oldest retained item, if any.
    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }
}
