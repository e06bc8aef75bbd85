//! Synapses: directed weighted connections between neurons.
//!
//! A synapse carries one `f32` weight per input channel. The weight count is
//! fixed when the synapse is created and the vector is never resized.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::topology::NeuronId;

/// A directed weighted connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    weights: Vec<f32>,
}

impl Synapse {
    /// Create a synapse from explicit weights.
    pub fn new(weights: Vec<f32>) -> Self {
        Self { weights }
    }

    /// Create a synapse with `count` copies of `weight`.
    pub fn uniform(count: usize, weight: f32) -> Self {
        Self {
            weights: vec![weight; count],
        }
    }

    /// Ordered weight vector.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Number of weights, fixed at construction.
    pub fn weight_count(&self) -> usize {
        self.weights.len()
    }
}

/// Ordered collection of synapses keyed by the neuron on the other end.
///
/// Enumeration order is insertion order, which is the configuration order.
/// The input tiling neuron relies on it to assign grid positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Synapses {
    entries: Vec<(NeuronId, Synapse)>,
}

impl Synapses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Re-inserting an existing peer replaces its synapse
    /// in place and keeps its position.
    pub fn insert(&mut self, peer: NeuronId, synapse: Synapse) {
        if let Some(entry) = self.entries.iter_mut().find(|(id, _)| *id == peer) {
            entry.1 = synapse;
        } else {
            self.entries.push((peer, synapse));
        }
    }

    pub fn get(&self, peer: NeuronId) -> Option<&Synapse> {
        self.entries
            .iter()
            .find(|(id, _)| *id == peer)
            .map(|(_, synapse)| synapse)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NeuronId, &Synapse)> {
        self.entries.iter().map(|(id, synapse)| (*id, synapse))
    }

    pub fn peers(&self) -> impl Iterator<Item = NeuronId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How weights are generated for synapses without explicit overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightInit {
    /// Every weight set to the same value.
    Constant { value: f32 },
    /// Weights drawn uniformly from `[min, max)` with a seeded generator.
    Uniform { min: f32, max: f32, seed: u64 },
}

impl Default for WeightInit {
    fn default() -> Self {
        Self::Constant { value: 1.0 }
    }
}

impl WeightInit {
    /// Check the parameters once, before any synapse is generated.
    pub fn validate(&self) -> KernelResult<()> {
        match *self {
            Self::Constant { value } if !value.is_finite() => Err(KernelError::config(format!(
                "weight_init constant must be finite, got {value}"
            ))),
            Self::Uniform { min, max, .. } if !(min.is_finite() && max.is_finite() && min < max) => {
                Err(KernelError::config(format!(
                    "weight_init uniform range [{min}, {max}) is empty or not finite"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Build a synapse of `count` weights.
    ///
    /// `edge` salts the uniform generator so each connection gets its own
    /// reproducible stream.
    pub fn build(&self, count: usize, edge: u64) -> Synapse {
        match *self {
            Self::Constant { value } => Synapse::uniform(count, value),
            Self::Uniform { min, max, seed } => {
                let mut rng = StdRng::seed_from_u64(seed ^ edge.rotate_left(17));
                Synapse::new((0..count).map(|_| rng.random_range(min..max)).collect())
            }
        }
    }
}
