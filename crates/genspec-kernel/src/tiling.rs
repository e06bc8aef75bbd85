//! Input tiling: slicing a full input grid into per-child patches.
//!
//! The tiling neuron sits in front of the first GenSpec layer. Each output
//! connection gets a logical grid position from its enumeration index; the
//! patch at that position is copied row by row and binarized before it is
//! forwarded.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::InputTilingConfig;
use crate::error::{KernelError, KernelResult};
use crate::spike::{Direction, Outbox};
use crate::topology::Topology;

/// Validated patch geometry.
///
/// Construction guarantees every patch window lies inside the source grid,
/// so extraction never reads out of bounds. Deserializing revalidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "InputTilingConfig", into = "InputTilingConfig")]
pub struct TilingLayout {
    config: InputTilingConfig,
    input_len: usize,
    patch_len: usize,
    child_count: usize,
}

impl TilingLayout {
    pub fn new(config: InputTilingConfig) -> KernelResult<Self> {
        let InputTilingConfig {
            input_width,
            input_height,
            patch_width,
            patch_height,
            stride_x,
            stride_y,
            grid_width,
            grid_height,
        } = config;

        let named = [
            ("input_width", input_width),
            ("input_height", input_height),
            ("patch_width", patch_width),
            ("patch_height", patch_height),
            ("grid_width", grid_width),
            ("grid_height", grid_height),
        ];
        if let Some((name, _)) = named.iter().find(|(_, value)| *value == 0) {
            return Err(KernelError::config(format!("input tiling: {name} must be positive")));
        }
        // A single row or column of children never steps, so its stride is unused.
        if stride_x == 0 && grid_width > 1 {
            return Err(KernelError::config("input tiling: stride_x must be positive when grid_width > 1"));
        }
        if stride_y == 0 && grid_height > 1 {
            return Err(KernelError::config("input tiling: stride_y must be positive when grid_height > 1"));
        }

        let extent_x = extent("x", grid_width, stride_x, patch_width)?;
        let extent_y = extent("y", grid_height, stride_y, patch_height)?;
        if extent_x > input_width || extent_y > input_height {
            return Err(KernelError::config(format!(
                "input tiling: patches span {extent_x}x{extent_y} but the input grid is {input_width}x{input_height}"
            )));
        }

        Ok(Self {
            input_len: config.input_len()?,
            patch_len: config.patch_len()?,
            child_count: config.grid_len()?,
            config,
        })
    }

    pub fn config(&self) -> &InputTilingConfig {
        &self.config
    }

    /// Number of children the layout addresses.
    pub fn child_count(&self) -> usize {
        self.child_count
    }

    /// Values per patch.
    pub fn patch_len(&self) -> usize {
        self.patch_len
    }

    /// Values per full input grid.
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Logical grid position of the child at enumeration `index`.
    pub fn position(&self, index: usize) -> (usize, usize) {
        (index % self.config.grid_width, index / self.config.grid_width)
    }

    /// Top-left corner of the patch for enumeration `index`, in source cells.
    pub fn origin(&self, index: usize) -> (usize, usize) {
        let (x, y) = self.position(index);
        (x * self.config.stride_x, y * self.config.stride_y)
    }

    /// Copy and binarize the patch for enumeration `index`.
    ///
    /// `index` must be below [`child_count`](Self::child_count) and `input`
    /// must hold [`input_len`](Self::input_len) values.
    pub fn extract(&self, input: &[u8], index: usize) -> KernelResult<Vec<u8>> {
        if input.len() != self.input_len() {
            return Err(KernelError::InputLengthMismatch {
                expected: self.input_len(),
                actual: input.len(),
            });
        }
        if index >= self.child_count() {
            return Err(KernelError::config(format!(
                "input tiling: connection {index} has no grid position ({} children)",
                self.child_count()
            )));
        }

        let (origin_x, origin_y) = self.origin(index);
        let width = self.config.patch_width;
        let mut patch = Vec::with_capacity(self.patch_len());
        for y in origin_y..origin_y + self.config.patch_height {
            let row_start = y * self.config.input_width + origin_x;
            patch.extend(
                input[row_start..row_start + width]
                    .iter()
                    .map(|&value| u8::from(value != 0)),
            );
        }
        Ok(patch)
    }
}

/// Span of `count` patches of `patch` cells placed `stride` apart.
fn extent(axis: &str, count: usize, stride: usize, patch: usize) -> KernelResult<usize> {
    (count - 1)
        .checked_mul(stride)
        .and_then(|steps| steps.checked_add(patch))
        .ok_or_else(|| KernelError::config(format!("input tiling: patch extent along {axis} overflows")))
}

impl TryFrom<InputTilingConfig> for TilingLayout {
    type Error = KernelError;

    fn try_from(config: InputTilingConfig) -> KernelResult<Self> {
        Self::new(config)
    }
}

impl From<TilingLayout> for InputTilingConfig {
    fn from(layout: TilingLayout) -> Self {
        layout.config
    }
}

/// Neuron that splits each incoming grid across its output connections.
///
/// Holds no per-message state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTilingNeuron {
    layout: TilingLayout,
}

impl InputTilingNeuron {
    pub fn new(config: InputTilingConfig) -> KernelResult<Self> {
        Ok(Self {
            layout: TilingLayout::new(config)?,
        })
    }

    pub fn layout(&self) -> &TilingLayout {
        &self.layout
    }

    /// Send one binarized patch to every output connection.
    pub fn on_input(&self, topology: &Topology, input: &[u8], outbox: &mut Outbox) -> KernelResult<()> {
        if input.len() != self.layout.input_len() {
            return Err(KernelError::InputLengthMismatch {
                expected: self.layout.input_len(),
                actual: input.len(),
            });
        }

        for (index, receiver) in topology.output_synapses().peers().enumerate() {
            let patch = self.layout.extract(input, index)?;
            trace!(
                neuron = %topology.name(),
                receiver = %receiver,
                index,
                "Forwarding patch"
            );
            outbox.send_multi_byte(receiver, Direction::Forward, patch);
        }
        Ok(())
    }
}
