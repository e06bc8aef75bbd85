//! Message types for acton-reactive neuron actors.
//!
//! Spikes are fire-and-forget and handled with `mutate_on`, one at a time.
//! Queries implement [`Request`] and are answered through the reply envelope,
//! so callers use `ask` and get the reply type back directly.

use acton_reactive::prelude::*;

use crate::neuron::NeuronStatus;
use crate::snapshot::NeuronSnapshot;
use crate::spike::{Direction, Spike};

/// A spike delivered to the receiving actor.
#[derive(Debug, Clone)]
pub struct DeliverSpike {
    /// Direction chosen by the sender
    pub direction: Direction,
    /// The spike itself, carrying the sender id
    pub spike: Spike,
}

/// Request a diagnostic read of the neuron.
#[derive(Debug, Clone)]
pub struct QueryStatus;

impl Request for QueryStatus {
    type Response = NeuronStatus;
}

/// Request the encoded region contribution.
#[derive(Debug, Clone)]
pub struct QueryContribution;

/// Encoded region contribution; empty for behaviors without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionBytes(pub Vec<u8>);

impl Request for QueryContribution {
    type Response = ContributionBytes;
}

/// Request a snapshot of the full neuron state.
#[derive(Debug, Clone)]
pub struct TakeSnapshot;

impl Request for TakeSnapshot {
    type Response = NeuronSnapshot;
}
