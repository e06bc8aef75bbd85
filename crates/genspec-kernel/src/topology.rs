//! Neuron identity and tree topology.
//!
//! Every neuron has a stable [`NeuronId`], an optional parent, an ordered list
//! of children, and its input/output synapses. Topology is fixed when the
//! network is built.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KernelError, KernelResult};
use crate::synapse::{Synapse, Synapses};

/// Unique identifier of a neuron actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeuronId(Uuid);

impl NeuronId {
    /// Sender id used for spikes injected from outside the network.
    pub const EXTERNAL: NeuronId = NeuronId(Uuid::nil());

    /// Deterministic id derived from a configuration name.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First group is enough to tell neurons apart in logs.
        let simple = self.0.simple().to_string();
        write!(f, "{}", &simple[..8])
    }
}

/// Placement of one neuron in the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    id: NeuronId,
    name: String,
    parent: Option<NeuronId>,
    children: Vec<NeuronId>,
    inputs: Synapses,
    outputs: Synapses,
}

impl Topology {
    /// Create a topology with no connections.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: NeuronId::from_name(&name),
            name,
            parent: None,
            children: Vec::new(),
            inputs: Synapses::new(),
            outputs: Synapses::new(),
        }
    }

    pub fn with_parent(mut self, parent: NeuronId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Append a child. Order of calls is the order winners are notified in.
    pub fn with_child(mut self, child: NeuronId) -> Self {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
        self
    }

    pub fn with_input(mut self, sender: NeuronId, synapse: Synapse) -> Self {
        self.inputs.insert(sender, synapse);
        self
    }

    pub fn with_output(mut self, receiver: NeuronId, synapse: Synapse) -> Self {
        self.outputs.insert(receiver, synapse);
        self
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NeuronId> {
        self.parent
    }

    pub fn children(&self) -> &[NeuronId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn output_synapses(&self) -> &Synapses {
        &self.outputs
    }

    pub fn input_synapses(&self) -> &Synapses {
        &self.inputs
    }

    /// Synapse carrying spikes from `sender` to this neuron.
    pub fn input_synapse(&self, sender: NeuronId) -> KernelResult<&Synapse> {
        self.inputs
            .get(sender)
            .ok_or(KernelError::MissingSynapse {
                neuron: self.id,
                sender,
            })
    }
}
