//! Configuration types for a GenSpec network.
//!
//! A network is described by a list of neurons, each naming its parent and
//! carrying a behavior section. Loaded from TOML/JSON at runtime; names are
//! resolved to ids by [`NetworkBuilder`](crate::network::NetworkBuilder).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::synapse::WeightInit;

/// Top-level network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Actor runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Weight generator for connections without an explicit override
    #[serde(default)]
    pub weight_init: WeightInit,

    /// Neuron definitions, in declaration order
    pub neurons: Vec<NeuronConfig>,

    /// Explicit weights for individual connections
    #[serde(default)]
    pub synapses: Vec<SynapseOverride>,
}

/// Actor runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// What an actor does after a handler returns a protocol error
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Inbox capacity of every neuron actor
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_inbox_capacity() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

/// Reaction of an actor to a failed message handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record the failure, log it and keep processing the mailbox.
    #[default]
    LogAndContinue,
    /// Record the failure and stop the actor.
    StopActor,
}

/// Configuration for a single neuron.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuronConfig {
    /// Unique name; the neuron id is derived from it
    pub name: String,

    /// Parent in the arbitration tree (absent for roots)
    #[serde(default)]
    pub parent: Option<String>,

    /// Output connections outside the tree, in enumeration order.
    /// Used by the input tiling neuron to address its patches.
    #[serde(default)]
    pub targets: Vec<String>,

    /// Behavior selected at construction
    pub behavior: BehaviorConfig,
}

/// Closed set of neuron behaviors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviorConfig {
    InputTiling(InputTilingConfig),
    GenSpec(GenSpecConfig),
    Accumulator,
}

impl BehaviorConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InputTiling(_) => "input_tiling",
            Self::GenSpec(_) => "gen_spec",
            Self::Accumulator => "accumulator",
        }
    }
}

/// Geometry of the input tiling neuron.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTilingConfig {
    /// Source grid width
    pub input_width: usize,
    /// Source grid height
    pub input_height: usize,
    /// Width of the patch sent to each child
    pub patch_width: usize,
    /// Height of the patch sent to each child
    pub patch_height: usize,
    /// Horizontal distance between patch origins
    pub stride_x: usize,
    /// Vertical distance between patch origins
    pub stride_y: usize,
    /// Children per row of the logical child grid
    pub grid_width: usize,
    /// Rows of the logical child grid
    pub grid_height: usize,
}

/// Parameters of a generalist/specialist neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenSpecConfig {
    /// Weights strictly above this value let their input through
    pub synapse_threshold: f32,
    /// Patch width
    pub input_width: usize,
    /// Patch height
    pub input_height: usize,
    /// Name of the accumulator this neuron reports wins to
    #[serde(default)]
    pub accumulator: Option<String>,
    /// Capacity of the generalization window (default 1)
    #[serde(default)]
    pub generalization_window: Option<usize>,
}

impl InputTilingConfig {
    /// Values per full input grid.
    pub fn input_len(&self) -> KernelResult<usize> {
        area("input tiling: input", self.input_width, self.input_height)
    }

    /// Values per patch.
    pub fn patch_len(&self) -> KernelResult<usize> {
        area("input tiling: patch", self.patch_width, self.patch_height)
    }

    /// Children addressed by the logical grid.
    pub fn grid_len(&self) -> KernelResult<usize> {
        area("input tiling: child grid", self.grid_width, self.grid_height)
    }
}

impl GenSpecConfig {
    /// Values per input patch.
    pub fn input_len(&self) -> KernelResult<usize> {
        area("gen_spec: input", self.input_width, self.input_height)
    }
}

/// `width * height`, or a config error when the product overflows.
pub(crate) fn area(what: &str, width: usize, height: usize) -> KernelResult<usize> {
    width
        .checked_mul(height)
        .ok_or_else(|| KernelError::config(format!("{what} size {width}x{height} overflows")))
}

/// Explicit weights for the connection `from -> to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapseOverride {
    pub from: String,
    pub to: String,
    pub weights: Vec<f32>,
}

impl NetworkConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> KernelResult<Self> {
        toml::from_str(source).map_err(|e| KernelError::config(format!("invalid TOML: {e}")))
    }

    /// Parse a JSON document.
    pub fn from_json_str(source: &str) -> KernelResult<Self> {
        serde_json::from_str(source).map_err(|e| KernelError::config(format!("invalid JSON: {e}")))
    }

    /// Load from a file, choosing the format by extension (`.json` or TOML).
    pub fn load(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }

    /// Look up a neuron definition by name.
    pub fn neuron(&self, name: &str) -> Option<&NeuronConfig> {
        self.neurons.iter().find(|n| n.name == name)
    }
}
