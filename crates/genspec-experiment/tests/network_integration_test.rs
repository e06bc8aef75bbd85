//! Integration tests for a spawned GenSpec network.
//!
//! Tests the full flow of:
//! - Input grid -> tiling -> patches at the first layer
//! - Child results -> parent arbitration -> WinnerSelected to every child
//! - Winner -> accumulator report and propagation to its own children
//! - Snapshot migration of a parent with a round in progress
//! - Error policies and recorded handler failures

use std::sync::{Arc, Mutex};

use genspec_experiment::experiment::{ExperimentRunner, ExperimentRunnerConfig};
use genspec_experiment::results::ExperimentResult;
use acton_reactive::prelude::ActonApp;
use genspec_kernel::{
    Direction, ErrorPolicy, Function, NetworkBuilder, NetworkConfig, NeuronActor, NeuronId, ResultArgs,
    RoundPhase, RuntimeServices, Spike, WeightUpdateHook,
};

const QUADRANTS: &str = r#"
[[neurons]]
name = "retina"
targets = ["q0", "q1", "q2", "q3"]
[neurons.behavior]
type = "input_tiling"
input_width = 4
input_height = 4
patch_width = 2
patch_height = 2
stride_x = 2
stride_y = 2
grid_width = 2
grid_height = 2

[[neurons]]
name = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 2
input_height = 2

[[neurons]]
name = "q0"
parent = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 2
input_height = 2
accumulator = "sink"

[[neurons]]
name = "q1"
parent = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 2
input_height = 2
accumulator = "sink"

[[neurons]]
name = "q2"
parent = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 2
input_height = 2
accumulator = "sink"

[[neurons]]
name = "q3"
parent = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 2
input_height = 2
accumulator = "sink"

[[neurons]]
name = "sink"
[neurons.behavior]
type = "accumulator"
"#;

/// Root with three leaf children, driven by hand.
const ARBITER: &str = r#"
[[neurons]]
name = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 1
input_height = 1

[[neurons]]
name = "child1"
parent = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 1
input_height = 1
accumulator = "sink"

[[neurons]]
name = "child2"
parent = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 1
input_height = 1
accumulator = "sink"

[[neurons]]
name = "child3"
parent = "root"
[neurons.behavior]
type = "gen_spec"
synapse_threshold = 0.5
input_width = 1
input_height = 1
accumulator = "sink"

[[neurons]]
name = "sink"
[neurons.behavior]
type = "accumulator"
"#;

#[rustfmt::skip]
const GRID: [u8; 16] = [
    0, 5, 0, 0,
    7, 0, 0, 0,
    0, 0, 9, 9,
    0, 1, 0, 255,
];

fn result_spike(child: &str, score: f64) -> Spike {
    Spike::functional(
        NeuronId::from_name(child),
        Function::Result(ResultArgs {
            result: score,
            is_leaf: true,
        }),
    )
}

/// Records every win with its input.
#[derive(Default)]
struct RecordingHook {
    wins: Mutex<Vec<(NeuronId, Vec<u8>)>>,
}

impl WeightUpdateHook for RecordingHook {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_win(&self, neuron: NeuronId, input: &[u8], _activation: f64) {
        self.wins.lock().unwrap().push((neuron, input.to_vec()));
    }
}

#[tokio::test]
async fn test_quadrants_reach_first_layer_and_strongest_wins() {
    let config = NetworkConfig::from_toml_str(QUADRANTS).unwrap();
    let hook = Arc::new(RecordingHook::default());
    let mut runtime = ActonApp::launch_async().await;
    let network = NetworkBuilder::new(config)
        .with_weight_update(hook.clone())
        .spawn(&mut runtime)
        .await
        .unwrap();

    network.present(&GRID).await.unwrap();
    network.wait_idle().await;

    let expected: [[u8; 4]; 4] = [[0, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 1], [1, 1, 0, 1]];
    for (i, patch) in expected.iter().enumerate() {
        let status = network.status(&format!("q{i}")).await.unwrap();
        let gen_spec = status.as_gen_spec().unwrap();
        assert_eq!(gen_spec.last_input, patch.to_vec(), "patch of q{i}");
        // Constant weights of 1.0 pass every cell.
        assert_eq!(gen_spec.activation, patch.iter().map(|&v| f64::from(v)).sum::<f64>());
        assert_eq!(gen_spec.is_winner, i == 3);
        assert_eq!(gen_spec.window_len, 1);
    }

    let root = network.status("root").await.unwrap();
    assert_eq!(root.as_gen_spec().unwrap().phase, RoundPhase::Idle);

    let sink = network.status("sink").await.unwrap();
    let tally = sink.as_accumulator().unwrap();
    assert_eq!(tally.reports, 1);
    assert_eq!(tally.leaf_activations, 1.0);
    assert_eq!(tally.senders[0].sender, NeuronId::from_name("q3"));

    let wins = hook.wins.lock().unwrap().clone();
    assert_eq!(wins, vec![(NeuronId::from_name("q3"), vec![1, 1, 0, 1])]);

    // Winner's factor is its ratio (4 weights / activation 3); losers hold 0.
    let contributions = network.contributions().await.unwrap();
    for (name, bytes) in &contributions {
        match name.as_str() {
            "retina" | "sink" => assert!(bytes.is_empty()),
            "q3" => {
                let factor = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                assert!((factor - 4.0 / 3.0).abs() < 1e-6);
                assert_eq!(bytes[4], 1);
            }
            "root" => assert_eq!(bytes[4], 0),
            _ => assert_eq!(&bytes[..4], &0.0f32.to_le_bytes()),
        }
    }

    assert!(network.failures().is_empty());
    runtime.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_three_children_tie_goes_to_earliest_and_all_are_notified() {
    let config = NetworkConfig::from_toml_str(ARBITER).unwrap();
    let mut runtime = ActonApp::launch_async().await;
    let network = NetworkBuilder::new(config).spawn(&mut runtime).await.unwrap();
    let root = network.handle("root").unwrap().clone();

    for (child, score) in [("child1", 3.0), ("child2", 7.0), ("child3", 7.0)] {
        assert!(root.send_spike(Direction::Backward, result_spike(child, score)).await);
        network.wait_idle().await;
    }

    for child in ["child1", "child2", "child3"] {
        let status = network.status(child).await.unwrap();
        let gen_spec = status.as_gen_spec().unwrap();
        assert_eq!(gen_spec.is_winner, child == "child2", "{child}");
        assert_eq!(gen_spec.window_len, 1, "{child} saw WinnerSelected");
    }

    let sink = network.status("sink").await.unwrap();
    let tally = sink.as_accumulator().unwrap();
    assert_eq!(tally.reports, 1);
    assert_eq!(tally.senders[0].sender, NeuronId::from_name("child2"));

    let root_status = network.status("root").await.unwrap();
    assert_eq!(root_status.as_gen_spec().unwrap().answered, 0);
    runtime.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_result_from_non_child_does_not_count() {
    let config = NetworkConfig::from_toml_str(ARBITER).unwrap();
    let mut runtime = ActonApp::launch_async().await;
    let network = NetworkBuilder::new(config).spawn(&mut runtime).await.unwrap();
    let root = network.handle("root").unwrap().clone();

    assert!(root.send_spike(Direction::Backward, result_spike("child1", 3.0)).await);
    assert!(root.send_spike(Direction::Backward, result_spike("sink", 9.0)).await);
    network.wait_idle().await;

    let status = network.status("root").await.unwrap();
    let gen_spec = status.as_gen_spec().unwrap();
    assert_eq!(gen_spec.answered, 1);
    assert_eq!(gen_spec.phase, RoundPhase::AwaitingResults);
    assert!(network.failures().is_empty());
    runtime.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_all_zero_round_stalls_visibly() {
    let config = NetworkConfig::from_toml_str(QUADRANTS).unwrap();
    let mut runtime = ActonApp::launch_async().await;
    let network = NetworkBuilder::new(config).spawn(&mut runtime).await.unwrap();

    network.present(&[0u8; 16]).await.unwrap();
    network.wait_idle().await;

    let root = network.status("root").await.unwrap();
    let root = root.as_gen_spec().unwrap();
    assert_eq!(root.answered, 4);
    assert_eq!(root.phase, RoundPhase::Stalled);

    let sink = network.status("sink").await.unwrap();
    assert_eq!(sink.as_accumulator().unwrap().reports, 0);
    runtime.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_migrated_parent_finishes_open_round() {
    let config = NetworkConfig::from_toml_str(ARBITER).unwrap();
    let mut runtime = ActonApp::launch_async().await;
    let network = NetworkBuilder::new(config.clone()).spawn(&mut runtime).await.unwrap();
    let root = network.handle("root").unwrap().clone();

    assert!(root.send_spike(Direction::Backward, result_spike("child1", 3.0)).await);
    assert!(root.send_spike(Direction::Backward, result_spike("child2", 7.0)).await);
    network.wait_idle().await;

    let status = network.status("root").await.unwrap();
    assert_eq!(status.as_gen_spec().unwrap().phase, RoundPhase::AwaitingResults);
    let json = network.snapshot("root").await.unwrap().to_json().unwrap();
    runtime.shutdown_all().await.unwrap();

    // Fresh runtime: the children come from configuration, the root from
    // its snapshot.
    let mut runtime = ActonApp::launch_async().await;
    let services = RuntimeServices::new(&config.runtime);
    let snapshot = genspec_kernel::NeuronSnapshot::from_json(&json).unwrap();
    let mut handles = Vec::new();
    for actor in NetworkBuilder::new(config).build().unwrap() {
        let actor = if actor.topology().name() == "root" {
            let topology = actor.topology().clone();
            NeuronActor::from_snapshot(snapshot.clone(), topology)
        } else {
            actor
        };
        handles.push(actor.spawn(&mut runtime, &services).await.unwrap());
    }
    let find = |name: &str| handles.iter().find(|h| h.name() == name).unwrap();
    let root = find("root");

    assert!(root.send_spike(Direction::Backward, result_spike("child3", 5.0)).await);
    services.wait_idle().await;

    let child2 = find("child2");
    assert!(child2.status().await.unwrap().as_gen_spec().unwrap().is_winner);
    let root_status = root.status().await.unwrap();
    assert_eq!(root_status.as_gen_spec().unwrap().phase, RoundPhase::Idle);
    runtime.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_bad_grid_is_recorded_and_actor_keeps_going() {
    let config = NetworkConfig::from_toml_str(QUADRANTS).unwrap();
    assert_eq!(config.runtime.error_policy, ErrorPolicy::LogAndContinue);
    let mut runtime = ActonApp::launch_async().await;
    let network = NetworkBuilder::new(config).spawn(&mut runtime).await.unwrap();

    network.present(&[1, 2, 3]).await.unwrap();
    network.wait_idle().await;

    let failures = network.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "retina");
    assert!(failures[0].protocol);

    network.present(&GRID).await.unwrap();
    network.wait_idle().await;
    let sink = network.status("sink").await.unwrap();
    assert_eq!(sink.as_accumulator().unwrap().reports, 1);
    runtime.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_stop_policy_silences_failing_actor() {
    let mut config = NetworkConfig::from_toml_str(QUADRANTS).unwrap();
    config.runtime.error_policy = ErrorPolicy::StopActor;
    let mut runtime = ActonApp::launch_async().await;
    let network = NetworkBuilder::new(config).spawn(&mut runtime).await.unwrap();

    network.present(&[1, 2, 3]).await.unwrap();
    network.wait_idle().await;

    assert_eq!(network.failures().len(), 1);
    assert!(network.status("retina").await.is_err());
    assert!(network.status("root").await.is_ok());
    runtime.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_runner_on_shipped_config_and_results_round_trip() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/quadrants.toml");
    let network_config = NetworkConfig::load(path).unwrap();
    let runner = ExperimentRunner::new(ExperimentRunnerConfig {
        network: "quadrants".to_string(),
        inputs: 6,
        density: 0.5,
        seed: Some(42),
    });

    let result = runner.run(network_config).await.unwrap();
    assert_eq!(result.per_input.len(), 6);
    // root, four first-layer and eight second-layer neurons
    assert_eq!(result.neurons.len(), 13);
    assert_eq!(result.accumulators.len(), 1);
    assert!(result.failures.is_empty());
    let per_input_total: u64 = result.per_input.iter().map(|m| m.reports).sum();
    assert_eq!(per_input_total, result.total_reports());
    let wins: u64 = result.neurons.iter().map(|n| n.wins).sum();
    assert_eq!(wins, result.total_reports());

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("result.json");
    result.save(&file).unwrap();
    let loaded = ExperimentResult::load(&file).unwrap();
    assert_eq!(loaded.config.network, "quadrants");
    assert_eq!(loaded.neurons.len(), result.neurons.len());
    assert_eq!(loaded.total_reports(), result.total_reports());
}
