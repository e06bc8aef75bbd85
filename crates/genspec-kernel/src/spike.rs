//! Spikes: the messages neurons exchange.
//!
//! A spike has exactly one active variant and always carries its sender id.
//! Handlers never send directly; they push [`Outgoing`] spikes into an
//! [`Outbox`] that the hosting actor delivers after the handler returns.

use serde::{Deserialize, Serialize};

use crate::topology::NeuronId;

/// Propagation direction of a spike through the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Parent to child (input and winner propagation).
    Forward,
    /// Child to parent (activation reports).
    Backward,
}

/// Arguments of a `Result` control spike.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultArgs {
    /// Activation (to a parent) or win marker `1.0` (to the accumulator)
    pub result: f64,
    /// Whether the reporting neuron has no children
    pub is_leaf: bool,
}

/// Arguments of a `WinnerSelected` control spike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerSelectedArgs {
    pub winner: NeuronId,
}

/// Control functions carried by functional spikes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Function {
    Result(ResultArgs),
    WinnerSelected(WinnerSelectedArgs),
}

/// Payload of a spike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpikeData {
    /// Byte pattern: a binarized patch or a propagated winning input
    MultiByte(Vec<u8>),
    /// Single intensity value
    Discrete(u64),
    /// Control protocol message
    Functional(Function),
}

/// Variant tag, for logging and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeKind {
    MultiByte,
    Discrete,
    Functional,
}

/// An immutable message between neurons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    sender: NeuronId,
    data: SpikeData,
}

impl Spike {
    pub fn multi_byte(sender: NeuronId, values: Vec<u8>) -> Self {
        Self {
            sender,
            data: SpikeData::MultiByte(values),
        }
    }

    pub fn discrete(sender: NeuronId, intensity: u64) -> Self {
        Self {
            sender,
            data: SpikeData::Discrete(intensity),
        }
    }

    pub fn functional(sender: NeuronId, function: Function) -> Self {
        Self {
            sender,
            data: SpikeData::Functional(function),
        }
    }

    pub fn sender(&self) -> NeuronId {
        self.sender
    }

    pub fn data(&self) -> &SpikeData {
        &self.data
    }

    pub fn kind(&self) -> SpikeKind {
        match self.data {
            SpikeData::MultiByte(_) => SpikeKind::MultiByte,
            SpikeData::Discrete(_) => SpikeKind::Discrete,
            SpikeData::Functional(_) => SpikeKind::Functional,
        }
    }

    /// Byte values of a multi-byte spike.
    pub fn values(&self) -> Option<&[u8]> {
        match &self.data {
            SpikeData::MultiByte(values) => Some(values),
            _ => None,
        }
    }
}

/// A spike addressed to a receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub receiver: NeuronId,
    pub direction: Direction,
    pub spike: Spike,
}

/// Spikes produced while handling one message, in send order.
#[derive(Debug)]
pub struct Outbox {
    owner: NeuronId,
    pending: Vec<Outgoing>,
}

impl Outbox {
    /// Create an empty outbox for spikes sent by `owner`.
    pub fn new(owner: NeuronId) -> Self {
        Self {
            owner,
            pending: Vec::new(),
        }
    }

    /// Id stamped as sender on spikes built by the helpers below.
    pub fn owner(&self) -> NeuronId {
        self.owner
    }

    /// Queue a spike for delivery.
    pub fn send(&mut self, receiver: NeuronId, direction: Direction, spike: Spike) {
        self.pending.push(Outgoing {
            receiver,
            direction,
            spike,
        });
    }

    pub fn send_multi_byte(&mut self, receiver: NeuronId, direction: Direction, values: Vec<u8>) {
        let spike = Spike::multi_byte(self.owner, values);
        self.send(receiver, direction, spike);
    }

    pub fn send_discrete(&mut self, receiver: NeuronId, direction: Direction, intensity: u64) {
        let spike = Spike::discrete(self.owner, intensity);
        self.send(receiver, direction, spike);
    }

    pub fn send_functional(&mut self, receiver: NeuronId, direction: Direction, function: Function) {
        let spike = Spike::functional(self.owner, function);
        self.send(receiver, direction, spike);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outgoing> {
        self.pending.iter()
    }

    /// Take all queued spikes, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_stamps_owner_and_keeps_order() {
        let owner = NeuronId::from_name("owner");
        let a = NeuronId::from_name("a");
        let b = NeuronId::from_name("b");

        let mut outbox = Outbox::new(owner);
        outbox.send_multi_byte(a, Direction::Forward, vec![1, 0, 1]);
        outbox.send_discrete(b, Direction::Forward, 42);
        outbox.send_functional(
            a,
            Direction::Backward,
            Function::Result(ResultArgs {
                result: 3.0,
                is_leaf: true,
            }),
        );

        let sent = outbox.drain();
        assert!(outbox.is_empty());
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|o| o.spike.sender() == owner));
        assert_eq!(sent[0].spike.values(), Some(&[1u8, 0, 1][..]));
        assert_eq!(sent[1].spike.kind(), SpikeKind::Discrete);
        assert_eq!(sent[2].direction, Direction::Backward);
    }
}
