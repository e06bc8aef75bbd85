//! Closed set of neuron behaviors and the single spike dispatch point.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accumulator::{AccumulatorNeuron, SenderTally};
use crate::config::BehaviorConfig;
use crate::error::KernelResult;
use crate::genspec::{DiagnosticRatio, GenSpecNeuron, RoundPhase, WeightUpdateHook};
use crate::region::RegionContribution;
use crate::spike::{Direction, Function, Outbox, Spike, SpikeData};
use crate::tiling::InputTilingNeuron;
use crate::topology::{NeuronId, Topology};

/// Everything a handler may touch besides the neuron's own state.
pub struct SpikeContext<'a> {
    pub topology: &'a Topology,
    pub outbox: &'a mut Outbox,
    pub weight_update: Option<&'a dyn WeightUpdateHook>,
}

/// A neuron's behavior and state, selected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neuron {
    InputTiling(InputTilingNeuron),
    GenSpec(GenSpecNeuron),
    Accumulator(AccumulatorNeuron),
}

impl Neuron {
    /// Build the behavior described by `config`.
    ///
    /// Accumulator names resolve to the id the network builder assigns to a
    /// neuron of that name.
    pub fn from_config(config: &BehaviorConfig) -> KernelResult<Self> {
        Ok(match config {
            BehaviorConfig::InputTiling(tiling) => Self::InputTiling(InputTilingNeuron::new(tiling.clone())?),
            BehaviorConfig::GenSpec(gen_spec) => {
                let accumulator = gen_spec.accumulator.as_deref().map(NeuronId::from_name);
                Self::GenSpec(GenSpecNeuron::new(gen_spec, accumulator)?)
            }
            BehaviorConfig::Accumulator => Self::Accumulator(AccumulatorNeuron::new()),
        })
    }

    pub fn behavior(&self) -> &'static str {
        match self {
            Self::InputTiling(_) => "input_tiling",
            Self::GenSpec(_) => "gen_spec",
            Self::Accumulator(_) => "accumulator",
        }
    }

    /// Handle one delivered spike.
    ///
    /// Spikes with no defined meaning for the behavior (discrete spikes,
    /// patterns travelling backward, stray control messages) are dropped.
    pub fn handle_spike(&mut self, direction: Direction, spike: &Spike, ctx: &mut SpikeContext<'_>) -> KernelResult<()> {
        let sender = spike.sender();
        match (self, direction, spike.data()) {
            (Self::InputTiling(tiling), Direction::Forward, SpikeData::MultiByte(values)) => {
                tiling.on_input(ctx.topology, values, ctx.outbox)
            }
            (Self::GenSpec(neuron), Direction::Forward, SpikeData::MultiByte(values)) => {
                neuron.on_input(ctx.topology, sender, values, ctx.outbox)
            }
            (Self::GenSpec(neuron), _, SpikeData::Functional(Function::Result(args))) => {
                neuron.on_result(ctx.topology, sender, args.result, ctx.outbox);
                Ok(())
            }
            (Self::GenSpec(neuron), _, SpikeData::Functional(Function::WinnerSelected(args))) => {
                neuron.on_winner_selected(ctx.topology, args.winner, ctx.outbox, ctx.weight_update)
            }
            (Self::Accumulator(sink), _, SpikeData::Functional(Function::Result(args))) => {
                sink.on_result(sender, *args);
                Ok(())
            }
            (neuron, direction, _) => {
                debug!(
                    neuron = %ctx.topology.name(),
                    behavior = neuron.behavior(),
                    sender = %sender,
                    kind = ?spike.kind(),
                    ?direction,
                    "Ignoring spike"
                );
                Ok(())
            }
        }
    }

    /// Region contribution, if this behavior has one.
    pub fn region_contribution(&self, topology: &Topology) -> Option<RegionContribution> {
        match self {
            Self::GenSpec(neuron) => Some(neuron.region_contribution(topology)),
            Self::InputTiling(_) | Self::Accumulator(_) => None,
        }
    }

    /// Encoded region contribution; empty for behaviors without one.
    pub fn contribute_to_region(&self, topology: &Topology) -> Vec<u8> {
        self.region_contribution(topology)
            .map(|c| c.to_bytes().to_vec())
            .unwrap_or_default()
    }

    /// Diagnostic read of the current state.
    pub fn status(&self, topology: &Topology) -> NeuronStatus {
        match self {
            Self::InputTiling(tiling) => NeuronStatus::InputTiling {
                child_count: tiling.layout().child_count(),
                patch_len: tiling.layout().patch_len(),
            },
            Self::GenSpec(neuron) => {
                let children = topology.children().len();
                NeuronStatus::GenSpec(GenSpecStatus {
                    activation: neuron.activation(),
                    ratio: neuron.ratio(),
                    is_winner: neuron.is_winner(),
                    answered: neuron.round().answered(),
                    phase: neuron.round().phase(children),
                    generalization_factor: neuron.generalization_factor(),
                    window_len: neuron.window().len(),
                    last_input: neuron.last_input().to_vec(),
                    input_difference: neuron.input_difference(),
                })
            }
            Self::Accumulator(sink) => NeuronStatus::Accumulator(AccumulatorStatus {
                activations: sink.activations(),
                leaf_activations: sink.leaf_activations(),
                reports: sink.reports(),
                senders: sink.senders().to_vec(),
            }),
        }
    }
}

/// Point-in-time view of a neuron, returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeuronStatus {
    InputTiling { child_count: usize, patch_len: usize },
    GenSpec(GenSpecStatus),
    Accumulator(AccumulatorStatus),
}

impl NeuronStatus {
    pub fn as_gen_spec(&self) -> Option<&GenSpecStatus> {
        match self {
            Self::GenSpec(status) => Some(status),
            _ => None,
        }
    }

    pub fn as_accumulator(&self) -> Option<&AccumulatorStatus> {
        match self {
            Self::Accumulator(status) => Some(status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenSpecStatus {
    pub activation: f64,
    pub ratio: DiagnosticRatio,
    pub is_winner: bool,
    /// Results received in the open round (parents only)
    pub answered: usize,
    pub phase: RoundPhase,
    pub generalization_factor: f64,
    pub window_len: usize,
    pub last_input: Vec<u8>,
    pub input_difference: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorStatus {
    pub activations: f64,
    pub leaf_activations: f64,
    pub reports: u64,
    pub senders: Vec<SenderTally>,
}
