//! GenSpec Kernel: hierarchical winner-take-all neurons over spikes
//!
//! This crate implements a tree of generalist/specialist neurons. An input
//! tiling neuron slices each input grid into binarized patches; GenSpec
//! neurons compute weighted activations, siblings compete through their
//! parent, and the winner passes its input further down the tree while a
//! rolling window tracks how often and how broadly each neuron wins.

pub mod accumulator;
pub mod actors;
pub mod config;
pub mod error;
pub mod genspec;
pub mod messages;
pub mod network;
pub mod neuron;
pub mod region;
pub mod services;
pub mod snapshot;
pub mod spike;
pub mod synapse;
pub mod tiling;
pub mod topology;
pub mod window;

pub use accumulator::AccumulatorNeuron;
pub use actors::{NeuronActor, NeuronActorState};
pub use config::{BehaviorConfig, ErrorPolicy, GenSpecConfig, InputTilingConfig, NetworkConfig, NeuronConfig, RuntimeConfig};
pub use error::{KernelError, KernelResult};
pub use genspec::{ArbitrationRound, DiagnosticRatio, GenSpecNeuron, RoundPhase, WeightUpdateHook};
pub use messages::{ContributionBytes, DeliverSpike, QueryContribution, QueryStatus, TakeSnapshot};
pub use network::{Network, NetworkBuilder};
pub use neuron::{AccumulatorStatus, GenSpecStatus, Neuron, NeuronStatus, SpikeContext};
pub use region::RegionContribution;
pub use services::{Directory, HandlerFailure, InFlight, NeuronHandle, RuntimeServices};
pub use snapshot::NeuronSnapshot;
pub use spike::{Direction, Function, Outbox, ResultArgs, Spike, SpikeData, WinnerSelectedArgs};
pub use synapse::{Synapse, Synapses, WeightInit};
pub use tiling::{InputTilingNeuron, TilingLayout};
pub use topology::{NeuronId, Topology};
pub use window::GeneralizationWindow;
