//! Experiment runner for GenSpec networks.
//!
//! Orchestrates the experiment lifecycle:
//! 1. Validate the network configuration and spawn its actors
//! 2. Present generated grids one at a time, waiting for quiescence
//! 3. Collect region contributions, accumulator tallies and failures
//! 4. Shut the runtime down

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use acton_reactive::prelude::ActonApp;
use futures::future::join_all;
use tracing::{debug, info, warn};

use genspec_kernel::{
    BehaviorConfig, NetworkBuilder, NetworkConfig, NeuronId, NeuronStatus,
    RegionContribution, WeightUpdateHook,
};

use crate::generator::{GeneratorConfig, GridGenerator, active_cells};
use crate::results::{AccumulatorSummary, ExperimentConfig, ExperimentResult, InputMetrics, NeuronSummary};

/// Weight-update hook that only counts wins per neuron.
#[derive(Debug, Default)]
pub struct WinCounter {
    wins: Mutex<HashMap<NeuronId, u64>>,
}

impl WinCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rounds `neuron` has won so far.
    pub fn wins(&self, neuron: NeuronId) -> u64 {
        match self.wins.lock() {
            Ok(wins) => wins.get(&neuron).copied().unwrap_or(0),
            Err(poisoned) => poisoned.into_inner().get(&neuron).copied().unwrap_or(0),
        }
    }
}

impl WeightUpdateHook for WinCounter {
    fn name(&self) -> &str {
        "win_counter"
    }

    fn on_win(&self, neuron: NeuronId, _input: &[u8], _activation: f64) {
        let mut wins = match self.wins.lock() {
            Ok(wins) => wins,
            Err(poisoned) => poisoned.into_inner(),
        };
        *wins.entry(neuron).or_default() += 1;
    }
}

/// Configuration for the experiment runner.
#[derive(Debug, Clone)]
pub struct ExperimentRunnerConfig {
    /// Label recorded with the results (usually the config path)
    pub network: String,
    /// Number of grids to present
    pub inputs: usize,
    /// Probability that an input cell is nonzero
    pub density: f64,
    /// Random seed (None for random)
    pub seed: Option<u64>,
}

impl Default for ExperimentRunnerConfig {
    fn default() -> Self {
        Self {
            network: "network".to_string(),
            inputs: 10,
            density: 0.4,
            seed: None,
        }
    }
}

pub struct ExperimentRunner {
    config: ExperimentRunnerConfig,
}

impl ExperimentRunner {
    /// Create a new experiment runner.
    pub fn new(config: ExperimentRunnerConfig) -> Self {
        Self { config }
    }

    /// Run one experiment against a fresh network.
    pub async fn run(&self, network_config: NetworkConfig) -> Result<ExperimentResult> {
        let started_at = Utc::now();

        let (width, height) = input_size(&network_config).context("network has no input_tiling neuron")?;
        let accumulators: Vec<String> = network_config
            .neurons
            .iter()
            .filter(|n| matches!(n.behavior, BehaviorConfig::Accumulator))
            .map(|n| n.name.clone())
            .collect();

        let mut generator = GridGenerator::new(GeneratorConfig {
            width,
            height,
            density: self.config.density,
            seed: self.config.seed,
        })?;

        let wins = Arc::new(WinCounter::new());
        let mut runtime = ActonApp::launch_async().await;
        let network = NetworkBuilder::new(network_config)
            .with_weight_update(wins.clone())
            .spawn(&mut runtime)
            .await
            .context("failed to build network")?;

        info!(
            network = %self.config.network,
            inputs = self.config.inputs,
            density = self.config.density,
            neurons = network.handles().len(),
            "Starting experiment"
        );

        let mut per_input = Vec::with_capacity(self.config.inputs);
        let mut reports_before = 0u64;
        for index in 0..self.config.inputs {
            let grid = generator.next_grid();
            let start = Instant::now();

            network.present(&grid).await?;
            network.wait_idle().await;

            let tallies = join_all(accumulators.iter().map(|name| network.status(name))).await;
            let mut reports = 0u64;
            for status in tallies {
                if let Some(tally) = status?.as_accumulator() {
                    reports += tally.reports;
                }
            }

            let metrics = InputMetrics {
                index,
                active_cells: active_cells(&grid),
                reports: reports - reports_before,
                duration_us: start.elapsed().as_micros() as u64,
            };
            debug!(
                index,
                active_cells = metrics.active_cells,
                reports = metrics.reports,
                "Input processed"
            );
            reports_before = reports;
            per_input.push(metrics);
        }

        let statuses = network.statuses().await?;
        let contributions = network.contributions().await?;

        let mut neurons = Vec::new();
        let mut accumulator_summaries = Vec::new();
        for ((name, status), (_, bytes)) in statuses.into_iter().zip(contributions) {
            match status {
                NeuronStatus::GenSpec(gen_spec) => {
                    let contribution = RegionContribution::from_bytes(&bytes)?;
                    let id = network
                        .handle(&name)
                        .map(|h| h.id())
                        .unwrap_or_else(|| NeuronId::from_name(&name));
                    neurons.push(NeuronSummary {
                        wins: wins.wins(id),
                        name,
                        generalization_factor: contribution.generalization_factor,
                        is_leaf: contribution.is_leaf,
                        open_round: gen_spec.answered,
                    });
                }
                NeuronStatus::Accumulator(tally) => accumulator_summaries.push(AccumulatorSummary {
                    name,
                    reports: tally.reports,
                    activations: tally.activations,
                    leaf_activations: tally.leaf_activations,
                }),
                NeuronStatus::InputTiling { .. } => {}
            }
        }

        let failures: Vec<String> = network
            .failures()
            .into_iter()
            .map(|f| format!("{}: {}", f.name, f.message))
            .collect();
        if !failures.is_empty() {
            warn!(failures = failures.len(), "Handlers failed during the experiment");
        }

        runtime.shutdown_all().await?;

        let result = ExperimentResult {
            config: ExperimentConfig {
                network: self.config.network.clone(),
                inputs: self.config.inputs,
                density: self.config.density,
                seed: self.config.seed,
            },
            started_at,
            ended_at: Utc::now(),
            per_input,
            neurons,
            accumulators: accumulator_summaries,
            failures,
        };
        info!(reports = result.total_reports(), "Experiment complete");
        Ok(result)
    }
}

/// Input grid size of the first input tiling neuron.
pub fn input_size(config: &NetworkConfig) -> Option<(usize, usize)> {
    config.neurons.iter().find_map(|n| match &n.behavior {
        BehaviorConfig::InputTiling(tiling) => Some((tiling.input_width, tiling.input_height)),
        _ => None,
    })
}
