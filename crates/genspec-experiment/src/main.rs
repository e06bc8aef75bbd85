//! GenSpec Experiment CLI.
//!
//! Commands:
//! - run: Present generated grids to a network and report the outcome
//! - inspect: Validate a network configuration and print its tree

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use genspec_experiment::experiment::{ExperimentRunner, ExperimentRunnerConfig};
use genspec_experiment::results::format_duration;
use genspec_kernel::{BehaviorConfig, NetworkBuilder, NetworkConfig, NeuronConfig};

/// Generate a timestamped output path from the given path.
/// e.g., "results.json" -> "results-20260108-010530.json"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[derive(Parser)]
#[command(name = "genspec")]
#[command(version)]
#[command(about = "Hierarchical generalist/specialist neuron experiments")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Present generated grids to a network
    Run {
        /// Network configuration (TOML or JSON)
        #[arg(long, env = "GENSPEC_CONFIG")]
        config: PathBuf,

        /// Number of grids to present
        #[arg(long, default_value = "10")]
        inputs: usize,

        /// Probability that an input cell is nonzero
        #[arg(long, default_value = "0.4")]
        density: f64,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output file for results (timestamp is appended)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a network configuration and print its tree
    Inspect {
        /// Network configuration (TOML or JSON)
        #[arg(long, env = "GENSPEC_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            config,
            inputs,
            density,
            seed,
            output,
        } => {
            let network_config = NetworkConfig::load(&config)?;
            let runner = ExperimentRunner::new(ExperimentRunnerConfig {
                network: config.display().to_string(),
                inputs,
                density,
                seed,
            });
            let result = runner.run(network_config).await?;

            println!("\n=== Experiment Result ===");
            println!("Network: {}", result.config.network);
            println!("Inputs: {} (density {:.2})", result.config.inputs, result.config.density);
            println!("Winner reports: {}", result.total_reports());
            if let Some(mean) = result.mean_generalization(true) {
                println!("Mean leaf generalization: {:.4}", mean);
            }
            if let Some(mean) = result.mean_generalization(false) {
                println!("Mean inner generalization: {:.4}", mean);
            }

            println!("\nNeurons:");
            println!("  {:<16} {:>6} {:>6} {:>10} {:>6}", "Name", "Leaf", "Wins", "Factor", "Open");
            for n in &result.neurons {
                println!(
                    "  {:<16} {:>6} {:>6} {:>10.4} {:>6}",
                    n.name, n.is_leaf, n.wins, n.generalization_factor, n.open_round
                );
            }

            println!("\nAccumulators:");
            for a in &result.accumulators {
                println!(
                    "  {}: {} reports, {:.0} activations ({:.0} from leaves)",
                    a.name, a.reports, a.activations, a.leaf_activations
                );
            }

            println!("\nPer-Input Metrics:");
            println!("  {:>5} {:>7} {:>8} {:>10}", "Input", "Active", "Reports", "Time");
            for m in &result.per_input {
                println!(
                    "  {:>5} {:>7} {:>8} {:>10}",
                    m.index,
                    m.active_cells,
                    m.reports,
                    format_duration(m.duration_us)
                );
            }

            if !result.failures.is_empty() {
                println!("\nFailures:");
                for failure in &result.failures {
                    println!("  {}", failure);
                }
            }

            if let Some(output) = output {
                let output = timestamped_path(&output);
                result.save(&output)?;
                info!(path = %output.display(), "Results saved");
            }
        }

        Commands::Inspect { config } => {
            let network_config = NetworkConfig::load(&config)?;
            let actors = NetworkBuilder::new(network_config.clone()).build()?;
            println!("{}: {} neurons, configuration valid", config.display(), actors.len());

            for root in network_config.neurons.iter().filter(|n| n.parent.is_none()) {
                print_tree(&network_config, root, 0);
            }
        }
    }

    Ok(())
}

fn print_tree(config: &NetworkConfig, neuron: &NeuronConfig, depth: usize) {
    let detail = match &neuron.behavior {
        BehaviorConfig::InputTiling(t) => format!(
            "{}x{} grid -> {}x{} patches of {}x{}, targets: {}",
            t.input_width,
            t.input_height,
            t.grid_width,
            t.grid_height,
            t.patch_width,
            t.patch_height,
            neuron.targets.join(", ")
        ),
        BehaviorConfig::GenSpec(g) => format!(
            "{}x{} input, threshold {}, accumulator {}",
            g.input_width,
            g.input_height,
            g.synapse_threshold,
            g.accumulator.as_deref().unwrap_or("-")
        ),
        BehaviorConfig::Accumulator => String::new(),
    };
    println!(
        "{}{} [{}] {}",
        "  ".repeat(depth + 1),
        neuron.name,
        neuron.behavior.type_name(),
        detail
    );

    for child in config
        .neurons
        .iter()
        .filter(|n| n.parent.as_deref() == Some(neuron.name.as_str()))
    {
        print_tree(config, child, depth + 1);
    }
}
