//! Pack/unpack of neuron state for migration.
//!
//! A snapshot carries the whole behavior state: round counters, window and
//! input buffer included. Topology is rebuilt from configuration and the
//! weight-update hook has to be attached again after restoring.

use serde::{Deserialize, Serialize};

use crate::error::KernelResult;
use crate::neuron::Neuron;
use crate::topology::NeuronId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronSnapshot {
    pub id: NeuronId,
    pub name: String,
    pub neuron: Neuron,
}

impl NeuronSnapshot {
    pub fn new(id: NeuronId, name: impl Into<String>, neuron: Neuron) -> Self {
        Self {
            id,
            name: name.into(),
            neuron,
        }
    }

    pub fn to_json(&self) -> KernelResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> KernelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Consume the snapshot, yielding the packed neuron.
    pub fn restore(self) -> Neuron {
        self.neuron
    }
}
