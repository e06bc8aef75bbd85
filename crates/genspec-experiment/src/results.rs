//! Results collection and output for GenSpec experiments.
//!
//! Captures:
//! - Per-input winner reports and timing
//! - Final generalization factor of every GenSpec neuron
//! - Accumulator tallies
//! - Handler failures recorded by the runtime

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration an experiment ran with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Network configuration file or label
    pub network: String,
    /// Number of grids presented
    pub inputs: usize,
    /// Probability that an input cell is nonzero
    pub density: f64,
    /// Random seed (if reproducible)
    pub seed: Option<u64>,
}

/// Metrics for a single presented grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMetrics {
    pub index: usize,
    /// Nonzero cells in the grid
    pub active_cells: usize,
    /// Winner reports the accumulators received for this grid
    pub reports: u64,
    pub duration_us: u64,
}

/// Final state of one GenSpec neuron.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuronSummary {
    pub name: String,
    pub generalization_factor: f32,
    pub is_leaf: bool,
    /// Rounds this neuron won
    pub wins: u64,
    /// Results received in a round that is still open
    pub open_round: usize,
}

/// Final tallies of one accumulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatorSummary {
    pub name: String,
    pub reports: u64,
    pub activations: f64,
    pub leaf_activations: f64,
}

/// Results from a single experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub config: ExperimentConfig,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub per_input: Vec<InputMetrics>,
    pub neurons: Vec<NeuronSummary>,
    pub accumulators: Vec<AccumulatorSummary>,
    /// Handler failures, formatted as `neuron: error`
    #[serde(default)]
    pub failures: Vec<String>,
}

impl ExperimentResult {
    /// Total winner reports across all accumulators.
    pub fn total_reports(&self) -> u64 {
        self.accumulators.iter().map(|a| a.reports).sum()
    }

    /// Mean generalization factor over neurons with the given leaf flag.
    pub fn mean_generalization(&self, leaves: bool) -> Option<f64> {
        let factors: Vec<f64> = self
            .neurons
            .iter()
            .filter(|n| n.is_leaf == leaves)
            .map(|n| f64::from(n.generalization_factor))
            .collect();
        if factors.is_empty() {
            return None;
        }
        Some(factors.iter().sum::<f64>() / factors.len() as f64)
    }

    /// Save results to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let results = serde_json::from_str(&json)?;
        Ok(results)
    }
}

/// Format a duration in microseconds for display.
pub fn format_duration(us: u64) -> String {
    if us < 1000 {
        format!("{}us", us)
    } else if us < 1_000_000 {
        format!("{:.1}ms", us as f64 / 1000.0)
    } else {
        format!("{:.1}s", us as f64 / 1_000_000.0)
    }
}
