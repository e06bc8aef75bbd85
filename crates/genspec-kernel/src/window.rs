//! Bounded rolling window behind the generalization factor.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

/// FIFO of the most recent samples, capped at `capacity`.
///
/// The generalization factor is always the mean of exactly the samples
/// currently held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralizationWindow {
    capacity: usize,
    samples: VecDeque<f64>,
    factor: f64,
}

impl GeneralizationWindow {
    /// Create an empty window. Capacity must be at least 1.
    pub fn new(capacity: usize) -> KernelResult<Self> {
        if capacity == 0 {
            return Err(KernelError::config(
                "generalization window capacity must be at least 1",
            ));
        }
        Ok(Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            factor: 0.0,
        })
    }

    /// Append a sample, evicting the oldest one when full, and recompute the
    /// factor. Returns the evicted sample.
    pub fn push(&mut self, sample: f64) -> Option<f64> {
        self.samples.push_back(sample);
        let evicted = if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.factor = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        evicted
    }

    /// Mean of the retained samples (0.0 before the first push).
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}
