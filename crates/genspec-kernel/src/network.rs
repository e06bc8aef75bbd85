//! Network construction: resolve names, validate shapes, wire synapses and
//! spawn one actor per neuron.
//!
//! ## Usage
//!
//! ```ignore
//! use acton_reactive::prelude::*;
//! use genspec_kernel::{NetworkBuilder, NetworkConfig};
//!
//! let config = NetworkConfig::load("configs/quadrants.toml")?;
//! let mut runtime = ActonApp::launch_async().await;
//! let network = NetworkBuilder::new(config).spawn(&mut runtime).await?;
//!
//! network.present(&grid).await?;
//! network.wait_idle().await;
//! let contributions = network.contributions().await?;
//! runtime.shutdown_all().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use acton_reactive::prelude::ActorRuntime;
use futures::future::join_all;
use tracing::info;

use crate::actors::NeuronActor;
use crate::config::{BehaviorConfig, NetworkConfig, NeuronConfig};
use crate::error::{KernelError, KernelResult};
use crate::genspec::WeightUpdateHook;
use crate::neuron::{Neuron, NeuronStatus};
use crate::services::{HandlerFailure, NeuronHandle, RuntimeServices};
use crate::snapshot::NeuronSnapshot;
use crate::spike::{Direction, Spike};
use crate::synapse::Synapse;
use crate::topology::{NeuronId, Topology};

/// Connections collected for one neuron before its topology is frozen.
#[derive(Default)]
struct Wiring {
    parent: Option<NeuronId>,
    children: Vec<NeuronId>,
    inputs: Vec<(NeuronId, Synapse)>,
    outputs: Vec<(NeuronId, Synapse)>,
}

/// Builder for a spawned network.
///
/// Every configuration problem is reported before any actor exists:
/// unknown or duplicate names, parent cycles, tiling target counts, patch and
/// input size mismatches, weight override shapes.
pub struct NetworkBuilder {
    config: NetworkConfig,
    weight_update: Option<Arc<dyn WeightUpdateHook>>,
}

impl NetworkBuilder {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            weight_update: None,
        }
    }

    /// Attach a hook to every neuron; it fires when a GenSpec neuron wins.
    pub fn with_weight_update(mut self, hook: Arc<dyn WeightUpdateHook>) -> Self {
        self.weight_update = Some(hook);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Validate the configuration and build unspawned actors, in declaration
    /// order.
    pub fn build(&self) -> KernelResult<Vec<NeuronActor>> {
        let config = &self.config;
        config.weight_init.validate()?;
        if config.runtime.inbox_capacity == 0 {
            return Err(KernelError::config("runtime: inbox_capacity must be positive"));
        }
        if config.neurons.is_empty() {
            return Err(KernelError::config("network declares no neurons"));
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, neuron) in config.neurons.iter().enumerate() {
            if neuron.name.is_empty() {
                return Err(KernelError::config(format!("neuron #{i} has an empty name")));
            }
            if index.insert(neuron.name.as_str(), i).is_some() {
                return Err(KernelError::config(format!("duplicate neuron name '{}'", neuron.name)));
            }
        }
        let resolve = |owner: &str, role: &str, name: &str| -> KernelResult<usize> {
            index
                .get(name)
                .copied()
                .ok_or_else(|| KernelError::config(format!("neuron {owner}: unknown {role} '{name}'")))
        };

        let neurons = config
            .neurons
            .iter()
            .map(|n| Neuron::from_config(&n.behavior).map_err(|e| in_neuron(&n.name, e)))
            .collect::<KernelResult<Vec<_>>>()?;

        for neuron in &config.neurons {
            self.check_neuron(neuron, &resolve)?;
        }
        check_acyclic(config, &index)?;

        let ids: Vec<NeuronId> = config.neurons.iter().map(|n| NeuronId::from_name(&n.name)).collect();
        let mut wiring: Vec<Wiring> = config.neurons.iter().map(|_| Wiring::default()).collect();
        let mut used_overrides = vec![false; config.synapses.len()];
        let mut edge = 0u64;

        // Tiling connections first, in target order: that order assigns grid
        // positions.
        for (from, neuron) in config.neurons.iter().enumerate() {
            let BehaviorConfig::InputTiling(tiling) = &neuron.behavior else {
                continue;
            };
            let patch_len = tiling.patch_len()?;
            for target in &neuron.targets {
                let to = resolve(&neuron.name, "target", target)?;
                let synapse = self.synapse(&neuron.name, target, patch_len, edge, &mut used_overrides)?;
                edge += 1;
                wiring[from].outputs.push((ids[to], synapse.clone()));
                wiring[to].inputs.push((ids[from], synapse));
            }
        }

        for (child, neuron) in config.neurons.iter().enumerate() {
            let Some(parent_name) = &neuron.parent else {
                continue;
            };
            let parent = resolve(&neuron.name, "parent", parent_name)?;
            let count = input_len(&neuron.behavior)?.unwrap_or_default();
            let synapse = self.synapse(parent_name, &neuron.name, count, edge, &mut used_overrides)?;
            edge += 1;
            wiring[child].parent = Some(ids[parent]);
            wiring[parent].children.push(ids[child]);
            wiring[parent].outputs.push((ids[child], synapse.clone()));
            wiring[child].inputs.push((ids[parent], synapse));
        }

        if let Some(unused) = used_overrides.iter().position(|used| !used) {
            let o = &config.synapses[unused];
            return Err(KernelError::config(format!(
                "synapse override {} -> {} matches no connection",
                o.from, o.to
            )));
        }

        let actors = config
            .neurons
            .iter()
            .zip(neurons)
            .zip(wiring)
            .map(|((neuron, behavior), wiring)| {
                let topology = freeze(&neuron.name, wiring);
                let actor = NeuronActor::new(behavior, topology);
                match &self.weight_update {
                    Some(hook) => actor.with_weight_update(hook.clone()),
                    None => actor,
                }
            })
            .collect();
        Ok(actors)
    }

    /// Validate, build and spawn every actor in the given runtime.
    ///
    /// Every actor is started and registered before this returns, so the
    /// network can be presented input right away.
    pub async fn spawn(self, runtime: &mut ActorRuntime) -> KernelResult<Network> {
        let actors = self.build()?;
        let services = RuntimeServices::new(&self.config.runtime);
        let mut handles = Vec::with_capacity(actors.len());
        let mut inputs = Vec::new();

        for actor in actors {
            let is_input = matches!(actor.neuron(), Neuron::InputTiling(_));
            let handle = actor.spawn(runtime, &services).await?;
            if is_input {
                inputs.push(handle.clone());
            }
            handles.push(handle);
        }

        info!(neurons = handles.len(), inputs = inputs.len(), "Network spawned");
        Ok(Network {
            handles,
            inputs,
            services,
        })
    }

    fn check_neuron(
        &self,
        neuron: &NeuronConfig,
        resolve: &impl Fn(&str, &str, &str) -> KernelResult<usize>,
    ) -> KernelResult<()> {
        let neurons = &self.config.neurons;
        let name = neuron.name.as_str();

        if let Some(parent_name) = &neuron.parent {
            if parent_name == name {
                return Err(KernelError::config(format!("neuron {name}: is its own parent")));
            }
            let parent = &neurons[resolve(name, "parent", parent_name)?];
            let (Some(own), Some(parents)) = (input_len(&neuron.behavior)?, input_len(&parent.behavior)?) else {
                return Err(KernelError::config(format!(
                    "neuron {name}: only gen_spec neurons can be parent and child ({} under {})",
                    neuron.behavior.type_name(),
                    parent.behavior.type_name()
                )));
            };
            if own != parents {
                return Err(KernelError::config(format!(
                    "neuron {name}: input size {own} differs from parent {parent_name} input size {parents}"
                )));
            }
        }

        match &neuron.behavior {
            BehaviorConfig::InputTiling(tiling) => {
                let expected = tiling.grid_len()?;
                if neuron.targets.len() != expected {
                    return Err(KernelError::config(format!(
                        "neuron {name}: {} targets for a {}x{} child grid",
                        neuron.targets.len(),
                        tiling.grid_width,
                        tiling.grid_height
                    )));
                }
                let patch_len = tiling.patch_len()?;
                for (i, target_name) in neuron.targets.iter().enumerate() {
                    if neuron.targets[..i].contains(target_name) {
                        return Err(KernelError::config(format!("neuron {name}: duplicate target '{target_name}'")));
                    }
                    let target = &neurons[resolve(name, "target", target_name)?];
                    if input_len(&target.behavior)? != Some(patch_len) {
                        return Err(KernelError::config(format!(
                            "neuron {name}: target {target_name} must be a gen_spec neuron with input size {patch_len}"
                        )));
                    }
                    if target.parent.is_none() {
                        return Err(KernelError::config(format!(
                            "neuron {name}: target {target_name} has no parent to report to"
                        )));
                    }
                }
            }
            BehaviorConfig::GenSpec(gen_spec) => {
                if !neuron.targets.is_empty() {
                    return Err(KernelError::config(format!(
                        "neuron {name}: only input_tiling neurons take targets"
                    )));
                }
                if let Some(accumulator_name) = &gen_spec.accumulator {
                    let accumulator = &neurons[resolve(name, "accumulator", accumulator_name)?];
                    if !matches!(accumulator.behavior, BehaviorConfig::Accumulator) {
                        return Err(KernelError::config(format!(
                            "neuron {name}: {accumulator_name} is not an accumulator"
                        )));
                    }
                }
            }
            BehaviorConfig::Accumulator => {
                if !neuron.targets.is_empty() {
                    return Err(KernelError::config(format!(
                        "neuron {name}: only input_tiling neurons take targets"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Weights for the connection `from -> to`: the explicit override if one
    /// exists, otherwise the configured generator.
    fn synapse(
        &self,
        from: &str,
        to: &str,
        count: usize,
        edge: u64,
        used: &mut [bool],
    ) -> KernelResult<Synapse> {
        let found = self
            .config
            .synapses
            .iter()
            .position(|o| o.from == from && o.to == to);
        let Some(i) = found else {
            return Ok(self.config.weight_init.build(count, edge));
        };

        let weights = &self.config.synapses[i].weights;
        if weights.len() != count {
            return Err(KernelError::config(format!(
                "synapse override {from} -> {to} has {} weights, connection needs {count}",
                weights.len()
            )));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite()) {
            return Err(KernelError::config(format!(
                "synapse override {from} -> {to} has non-finite weight {bad}"
            )));
        }
        used[i] = true;
        Ok(Synapse::new(weights.clone()))
    }
}

/// Input size of a GenSpec neuron; `None` for other behaviors.
fn input_len(behavior: &BehaviorConfig) -> KernelResult<Option<usize>> {
    match behavior {
        BehaviorConfig::GenSpec(gen_spec) => gen_spec.input_len().map(Some),
        _ => Ok(None),
    }
}

fn in_neuron(name: &str, error: KernelError) -> KernelError {
    match error {
        KernelError::Config(msg) => KernelError::config(format!("neuron {name}: {msg}")),
        other => other,
    }
}

fn check_acyclic(config: &NetworkConfig, index: &HashMap<&str, usize>) -> KernelResult<()> {
    for neuron in &config.neurons {
        let mut current = neuron;
        for _ in 0..config.neurons.len() {
            let Some(parent) = current.parent.as_deref().and_then(|p| index.get(p)) else {
                break;
            };
            current = &config.neurons[*parent];
            if current.name == neuron.name {
                return Err(KernelError::config(format!(
                    "neuron {}: parent chain forms a cycle",
                    neuron.name
                )));
            }
        }
    }
    Ok(())
}

fn freeze(name: &str, wiring: Wiring) -> Topology {
    let mut topology = Topology::new(name);
    if let Some(parent) = wiring.parent {
        topology = topology.with_parent(parent);
    }
    let topology = wiring.children.into_iter().fold(topology, Topology::with_child);
    let topology = wiring
        .inputs
        .into_iter()
        .fold(topology, |t, (sender, synapse)| t.with_input(sender, synapse));
    wiring
        .outputs
        .into_iter()
        .fold(topology, |t, (receiver, synapse)| t.with_output(receiver, synapse))
}

/// Handles to a spawned network.
#[derive(Debug, Clone)]
pub struct Network {
    handles: Vec<NeuronHandle>,
    inputs: Vec<NeuronHandle>,
    services: RuntimeServices,
}

impl Network {
    /// Every actor, in declaration order.
    pub fn handles(&self) -> &[NeuronHandle] {
        &self.handles
    }

    /// Input tiling actors.
    pub fn inputs(&self) -> &[NeuronHandle] {
        &self.inputs
    }

    pub fn handle(&self, name: &str) -> Option<&NeuronHandle> {
        self.handles.iter().find(|h| h.name() == name)
    }

    pub fn services(&self) -> &RuntimeServices {
        &self.services
    }

    /// Handler failures recorded so far, oldest first.
    pub fn failures(&self) -> Vec<HandlerFailure> {
        self.services.failures()
    }

    fn require(&self, name: &str) -> KernelResult<&NeuronHandle> {
        self.handle(name)
            .ok_or_else(|| KernelError::config(format!("unknown neuron '{name}'")))
    }

    /// Send a full input grid to every input tiling actor.
    pub async fn present(&self, grid: &[u8]) -> KernelResult<()> {
        if self.inputs.is_empty() {
            return Err(KernelError::config("network has no input_tiling neuron"));
        }
        for input in &self.inputs {
            let spike = Spike::multi_byte(NeuronId::EXTERNAL, grid.to_vec());
            if !input.send_spike(Direction::Forward, spike).await {
                return Err(KernelError::Runtime(format!("input {} has stopped", input.name())));
            }
        }
        Ok(())
    }

    /// Resolve once every spike caused so far has been handled.
    pub async fn wait_idle(&self) {
        self.services.wait_idle().await;
    }

    pub async fn status(&self, name: &str) -> KernelResult<NeuronStatus> {
        self.require(name)?.status().await
    }

    pub async fn snapshot(&self, name: &str) -> KernelResult<NeuronSnapshot> {
        self.require(name)?.snapshot().await
    }

    /// Status of every actor, in declaration order.
    pub async fn statuses(&self) -> KernelResult<Vec<(String, NeuronStatus)>> {
        let replies = join_all(self.handles.iter().map(|h| h.status())).await;
        self.handles
            .iter()
            .zip(replies)
            .map(|(h, status)| status.map(|s| (h.name().to_string(), s)))
            .collect()
    }

    /// Encoded region contribution of every actor, in declaration order.
    /// Behaviors without a contribution yield an empty buffer.
    pub async fn contributions(&self) -> KernelResult<Vec<(String, Vec<u8>)>> {
        let replies = join_all(self.handles.iter().map(|h| h.contribution())).await;
        self.handles
            .iter()
            .zip(replies)
            .map(|(h, bytes)| bytes.map(|b| (h.name().to_string(), b)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenSpecConfig, InputTilingConfig, SynapseOverride};
    use crate::synapse::WeightInit;

    fn gen_spec(name: &str, parent: Option<&str>, size: usize) -> NeuronConfig {
        NeuronConfig {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            targets: Vec::new(),
            behavior: BehaviorConfig::GenSpec(GenSpecConfig {
                synapse_threshold: 0.5,
                input_width: size,
                input_height: 1,
                accumulator: Some("sink".to_string()),
                generalization_window: None,
            }),
        }
    }

    fn tiling(targets: &[&str], grid: usize) -> NeuronConfig {
        NeuronConfig {
            name: "retina".to_string(),
            parent: None,
            targets: targets.iter().map(|t| t.to_string()).collect(),
            behavior: BehaviorConfig::InputTiling(InputTilingConfig {
                input_width: 2 * grid,
                input_height: 1,
                patch_width: 2,
                patch_height: 1,
                stride_x: 2,
                stride_y: 1,
                grid_width: grid,
                grid_height: 1,
            }),
        }
    }

    fn sink() -> NeuronConfig {
        NeuronConfig {
            name: "sink".to_string(),
            parent: None,
            targets: Vec::new(),
            behavior: BehaviorConfig::Accumulator,
        }
    }

    fn network(neurons: Vec<NeuronConfig>) -> NetworkConfig {
        NetworkConfig {
            runtime: Default::default(),
            weight_init: WeightInit::default(),
            neurons,
            synapses: Vec::new(),
        }
    }

    fn valid() -> NetworkConfig {
        network(vec![
            tiling(&["a", "b"], 2),
            gen_spec("root", None, 2),
            gen_spec("a", Some("root"), 2),
            gen_spec("b", Some("root"), 2),
            sink(),
        ])
    }

    fn build_err(config: NetworkConfig) -> String {
        let err = NetworkBuilder::new(config).build().unwrap_err();
        assert!(err.is_config(), "expected config error, got {err}");
        err.to_string()
    }

    #[test]
    fn test_wiring_follows_declaration_order() {
        let actors = NetworkBuilder::new(valid()).build().unwrap();
        assert_eq!(actors.len(), 5);

        let retina = actors[0].topology();
        let targets: Vec<_> = retina.output_synapses().peers().collect();
        assert_eq!(targets, vec![NeuronId::from_name("a"), NeuronId::from_name("b")]);

        let root = actors[1].topology();
        assert_eq!(root.children(), &[NeuronId::from_name("a"), NeuronId::from_name("b")]);
        assert!(root.parent().is_none());

        let a = actors[2].topology();
        assert_eq!(a.parent(), Some(root.id()));
        assert!(a.input_synapse(retina.id()).is_ok());
        assert_eq!(a.input_synapse(root.id()).unwrap().weights(), &[1.0, 1.0]);
        assert!(a.is_leaf());
    }

    #[test]
    fn test_override_replaces_generated_weights() {
        let mut config = valid();
        config.synapses.push(SynapseOverride {
            from: "retina".to_string(),
            to: "b".to_string(),
            weights: vec![0.25, 0.75],
        });
        let actors = NetworkBuilder::new(config).build().unwrap();
        let b = actors[3].topology();
        let weights = b.input_synapse(NeuronId::from_name("retina")).unwrap().weights();
        assert_eq!(weights, &[0.25, 0.75]);
    }

    #[test]
    fn test_configuration_errors() {
        let mut dup = valid();
        dup.neurons.push(sink());
        assert!(build_err(dup).contains("duplicate"));

        let mut orphan = valid();
        orphan.neurons[2].parent = Some("nowhere".to_string());
        assert!(build_err(orphan).contains("unknown parent"));

        let count = network(vec![
            tiling(&["a"], 2),
            gen_spec("root", None, 2),
            gen_spec("a", Some("root"), 2),
            sink(),
        ]);
        assert!(build_err(count).contains("targets"));

        let size = network(vec![
            tiling(&["a", "b"], 2),
            gen_spec("root", None, 2),
            gen_spec("a", Some("root"), 2),
            gen_spec("b", Some("root"), 3),
            sink(),
        ]);
        build_err(size);

        let mut bad_override = valid();
        bad_override.synapses.push(SynapseOverride {
            from: "root".to_string(),
            to: "a".to_string(),
            weights: vec![1.0],
        });
        assert!(build_err(bad_override).contains("needs 2"));

        let mut dangling = valid();
        dangling.synapses.push(SynapseOverride {
            from: "a".to_string(),
            to: "b".to_string(),
            weights: vec![1.0, 1.0],
        });
        assert!(build_err(dangling).contains("matches no connection"));

        let mut not_sink = valid();
        if let BehaviorConfig::GenSpec(gs) = &mut not_sink.neurons[2].behavior {
            gs.accumulator = Some("root".to_string());
        }
        assert!(build_err(not_sink).contains("not an accumulator"));
    }

    #[test]
    fn test_parent_cycle_rejected() {
        let cycle = network(vec![
            gen_spec("x", Some("y"), 2),
            gen_spec("y", Some("x"), 2),
            sink(),
        ]);
        assert!(build_err(cycle).contains("cycle"));
    }

    #[test]
    fn test_oversized_geometry_is_config_error() {
        let mut wide = valid();
        if let BehaviorConfig::GenSpec(gs) = &mut wide.neurons[2].behavior {
            gs.input_width = usize::MAX;
            gs.input_height = 2;
        }
        let msg = build_err(wide);
        assert!(msg.contains("neuron a:") && msg.contains("overflows"), "{msg}");

        let mut strided = valid();
        if let BehaviorConfig::InputTiling(t) = &mut strided.neurons[0].behavior {
            t.stride_x = usize::MAX;
        }
        assert!(build_err(strided).contains("overflows"));
    }

    #[test]
    fn test_zero_inbox_capacity_rejected() {
        let mut config = valid();
        config.runtime.inbox_capacity = 0;
        assert!(build_err(config).contains("inbox_capacity"));
    }

    #[test]
    fn test_invalid_behavior_names_the_neuron() {
        let mut config = valid();
        if let BehaviorConfig::GenSpec(gs) = &mut config.neurons[3].behavior {
            gs.generalization_window = Some(0);
        }
        assert!(build_err(config).starts_with("Configuration error: neuron b:"));
    }
}
