//! Input grid generator with controlled density.
//!
//! Each cell is nonzero with probability `density`; nonzero cells get a
//! random intensity in `1..=255`. The tiling neuron binarizes them anyway,
//! so intensity only matters for diagnostics.

use anyhow::{Result, bail};
use rand::prelude::*;

/// Configuration for grid generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
    /// Probability that a cell is nonzero
    pub density: f64,
    /// Random seed for reproducibility (None for random)
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: 4,
            height: 4,
            density: 0.4,
            seed: None,
        }
    }
}

/// Stream of random input grids.
pub struct GridGenerator {
    config: GeneratorConfig,
    rng: StdRng,
}

impl GridGenerator {
    /// Create a new generator. Fails on an empty grid or a density outside
    /// `[0, 1]`.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            bail!("grid size {}x{} must be positive", config.width, config.height);
        }
        if !(0.0..=1.0).contains(&config.density) {
            bail!("density {} must be within [0, 1]", config.density);
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the next row-major grid.
    pub fn next_grid(&mut self) -> Vec<u8> {
        let cells = self.config.width * self.config.height;
        (0..cells)
            .map(|_| {
                if self.rng.random_bool(self.config.density) {
                    self.rng.random_range(1..=255)
                } else {
                    0
                }
            })
            .collect()
    }

    /// Generate `count` grids.
    pub fn generate_batch(&mut self, count: usize) -> Vec<Vec<u8>> {
        (0..count).map(|_| self.next_grid()).collect()
    }
}

/// Number of nonzero cells in a grid.
pub fn active_cells(grid: &[u8]) -> usize {
    grid.iter().filter(|&&v| v != 0).count()
}
