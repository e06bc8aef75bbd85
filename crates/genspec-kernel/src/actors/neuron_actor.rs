//! NeuronActor: hosts one neuron on acton-reactive.
//!
//! Spikes mutate the neuron through `mutate_on`, so the actor handles exactly
//! one spike at a time and round state needs no locking. Queries are
//! read-only `act_on` handlers answered through the reply envelope.

use std::sync::Arc;

use acton_reactive::prelude::*;
use tracing::{debug, error, warn};

use crate::config::ErrorPolicy;
use crate::error::{KernelError, KernelResult};
use crate::genspec::WeightUpdateHook;
use crate::messages::{ContributionBytes, DeliverSpike, QueryContribution, QueryStatus, TakeSnapshot};
use crate::neuron::{Neuron, SpikeContext};
use crate::services::{NeuronHandle, RuntimeServices};
use crate::snapshot::NeuronSnapshot;
use crate::spike::Outbox;
use crate::topology::Topology;

/// Actor state for NeuronActor.
#[derive(Default)]
pub struct NeuronActorState {
    /// The hosted neuron
    neuron: Option<Neuron>,
    /// Parent, children and synapses of the neuron
    topology: Option<Topology>,
    /// Called whenever the neuron wins a round
    weight_update: Option<Arc<dyn WeightUpdateHook>>,
    /// Directory, tracker and failure log of the network
    services: Option<RuntimeServices>,
    /// Set after a failure under [`ErrorPolicy::StopActor`]
    halted: bool,
}

impl std::fmt::Debug for NeuronActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuronActorState")
            .field("name", &self.topology.as_ref().map(|t| t.name()))
            .field("behavior", &self.neuron.as_ref().map(|n| n.behavior()))
            .field("weight_update", &self.weight_update.as_ref().map(|h| h.name()))
            .field("halted", &self.halted)
            .finish()
    }
}

/// Actor owning a neuron and its place in the network.
///
/// Handles:
/// - `DeliverSpike` - dispatch to the neuron, then route its outbox
/// - `QueryStatus` / `QueryContribution` / `TakeSnapshot` - read-only replies
pub struct NeuronActor {
    neuron: Neuron,
    topology: Topology,
    weight_update: Option<Arc<dyn WeightUpdateHook>>,
}

impl std::fmt::Debug for NeuronActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuronActor")
            .field("name", &self.topology.name())
            .field("behavior", &self.neuron.behavior())
            .field("weight_update", &self.weight_update.as_ref().map(|h| h.name()))
            .finish()
    }
}

impl NeuronActor {
    pub fn new(neuron: Neuron, topology: Topology) -> Self {
        Self {
            neuron,
            topology,
            weight_update: None,
        }
    }

    /// Rebuild an actor from a migrated snapshot. The hook is not part of the
    /// snapshot and has to be attached again.
    pub fn from_snapshot(snapshot: NeuronSnapshot, topology: Topology) -> Self {
        Self::new(snapshot.restore(), topology)
    }

    /// Attach a hook called whenever this neuron wins a round.
    pub fn with_weight_update(mut self, hook: Arc<dyn WeightUpdateHook>) -> Self {
        self.weight_update = Some(hook);
        self
    }

    pub fn neuron(&self) -> &Neuron {
        &self.neuron
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Spawn this actor in the given runtime.
    ///
    /// The actor is registered in the directory once started, so spikes
    /// routed to its id afterwards reach it.
    pub async fn spawn(self, runtime: &mut ActorRuntime, services: &RuntimeServices) -> KernelResult<NeuronHandle> {
        let id = self.topology.id();
        let name = self.topology.name().to_string();

        let config = ActorConfig::new_with_name(actor_name(&name))
            .map_err(|e| KernelError::Runtime(format!("neuron {name}: cannot name actor: {e}")))?
            .with_inbox_capacity(services.inbox_capacity());
        let mut actor = runtime.new_actor_with_config::<NeuronActorState>(config);

        actor.model.neuron = Some(self.neuron);
        actor.model.topology = Some(self.topology);
        actor.model.weight_update = self.weight_update;
        actor.model.services = Some(services.clone());

        actor.after_start(|actor| {
            if let (Some(neuron), Some(topology)) = (&actor.model.neuron, &actor.model.topology) {
                debug!(
                    neuron = %topology.name(),
                    behavior = neuron.behavior(),
                    children = topology.children().len(),
                    "Neuron actor started"
                );
            }
            Reply::ready()
        });

        configure_neuron_actor(&mut actor);

        let handle = actor.start().await;
        services.register(id, handle.clone());
        Ok(NeuronHandle::new(id, &name, handle, services.clone()))
    }
}

/// Actor root names only take alphanumerics and dashes.
fn actor_name(neuron: &str) -> String {
    let cleaned: String = neuron
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("neuron-{cleaned}")
}

/// Configure message handlers for the NeuronActor.
fn configure_neuron_actor(actor: &mut ManagedActor<Idle, NeuronActorState>) {
    // mutate_on: spikes change round state and must not interleave
    actor.mutate_on::<DeliverSpike>(|actor, context| {
        let msg = context.message().clone();
        let self_handle = actor.handle().clone();
        let state = &mut actor.model;

        let Some(services) = state.services.clone() else {
            error!("NeuronActor: runtime services not set");
            return Reply::ready();
        };
        let (Some(neuron), Some(topology)) = (state.neuron.as_mut(), state.topology.as_ref()) else {
            error!("NeuronActor: neuron not initialized");
            services.finish();
            return Reply::ready();
        };
        if state.halted {
            debug!(neuron = %topology.name(), sender = %msg.spike.sender(), "Discarding spike for halted actor");
            services.finish();
            return Reply::ready();
        }

        let mut outbox = Outbox::new(topology.id());
        let mut ctx = SpikeContext {
            topology,
            outbox: &mut outbox,
            weight_update: state.weight_update.as_deref(),
        };
        let mut stop = false;
        if let Err(e) = neuron.handle_spike(msg.direction, &msg.spike, &mut ctx) {
            services.record_failure(topology.id(), topology.name(), &e);
            match services.policy() {
                ErrorPolicy::LogAndContinue => warn!(
                    neuron = %topology.name(),
                    sender = %msg.spike.sender(),
                    error = %e,
                    "Spike handler failed"
                ),
                ErrorPolicy::StopActor => {
                    error!(
                        neuron = %topology.name(),
                        sender = %msg.spike.sender(),
                        error = %e,
                        "Spike handler failed, stopping actor"
                    );
                    stop = true;
                }
            }
        }
        if stop {
            state.halted = true;
        }

        let outgoing = outbox.drain();
        Reply::pending(async move {
            for spike in outgoing {
                services.route(spike).await;
            }
            if stop {
                self_handle.send(SystemSignal::Terminate).await;
            }
            services.finish();
        })
    });

    // act_on: queries only read state; a halted actor does not answer
    actor.act_on::<QueryStatus>(|actor, context| {
        let reply = context.reply_envelope();
        let state = &actor.model;
        let (Some(neuron), Some(topology), false) = (&state.neuron, &state.topology, state.halted) else {
            return Reply::ready();
        };
        let status = neuron.status(topology);
        Reply::pending(async move {
            reply.send(status).await;
        })
    });

    actor.act_on::<QueryContribution>(|actor, context| {
        let reply = context.reply_envelope();
        let state = &actor.model;
        let (Some(neuron), Some(topology), false) = (&state.neuron, &state.topology, state.halted) else {
            return Reply::ready();
        };
        let bytes = ContributionBytes(neuron.contribute_to_region(topology));
        Reply::pending(async move {
            reply.send(bytes).await;
        })
    });

    actor.act_on::<TakeSnapshot>(|actor, context| {
        let reply = context.reply_envelope();
        let state = &actor.model;
        let (Some(neuron), Some(topology), false) = (&state.neuron, &state.topology, state.halted) else {
            return Reply::ready();
        };
        let snapshot = NeuronSnapshot::new(topology.id(), topology.name(), neuron.clone());
        Reply::pending(async move {
            reply.send(snapshot).await;
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BehaviorConfig, GenSpecConfig, RuntimeConfig};
    use crate::spike::{Direction, Spike};
    use crate::synapse::Synapse;
    use crate::topology::NeuronId;
    use tokio::sync::RwLock;

    fn leaf(parent: NeuronId) -> NeuronActor {
        let neuron = Neuron::from_config(&BehaviorConfig::GenSpec(GenSpecConfig {
            synapse_threshold: 0.5,
            input_width: 2,
            input_height: 1,
            accumulator: None,
            generalization_window: None,
        }))
        .unwrap();
        let topology = Topology::new("leaf")
            .with_parent(parent)
            .with_input(parent, Synapse::uniform(2, 1.0));
        NeuronActor::new(neuron, topology)
    }

    #[derive(Debug, Default)]
    struct RecorderState {
        received: Arc<RwLock<Vec<DeliverSpike>>>,
        services: Option<RuntimeServices>,
    }

    /// Stand-in parent that records every spike it is sent.
    async fn spawn_recorder(
        runtime: &mut ActorRuntime,
        services: &RuntimeServices,
        id: NeuronId,
        received: Arc<RwLock<Vec<DeliverSpike>>>,
    ) {
        let mut actor = runtime.new_actor_with_name::<RecorderState>("recorder".to_string());
        actor.model.received = received;
        actor.model.services = Some(services.clone());

        actor.mutate_on::<DeliverSpike>(|actor, context| {
            let msg = context.message().clone();
            let received = actor.model.received.clone();
            let services = actor.model.services.clone();
            Reply::pending(async move {
                received.write().await.push(msg);
                if let Some(services) = services {
                    services.finish();
                }
            })
        });

        let handle = actor.start().await;
        services.register(id, handle);
    }

    #[test]
    fn test_actor_names_are_sanitized() {
        assert_eq!(actor_name("l1_a"), "neuron-l1-a");
        assert_eq!(actor_name("root"), "neuron-root");
    }

    #[tokio::test]
    async fn test_forward_spike_updates_state_and_routes_report() {
        let mut runtime = ActonApp::launch_async().await;
        let services = RuntimeServices::new(&RuntimeConfig::default());
        let parent = NeuronId::from_name("parent");
        let received = Arc::new(RwLock::new(Vec::new()));
        spawn_recorder(&mut runtime, &services, parent, received.clone()).await;
        let handle = leaf(parent).spawn(&mut runtime, &services).await.unwrap();

        handle
            .send_spike(Direction::Forward, Spike::multi_byte(parent, vec![1, 0]))
            .await;
        services.wait_idle().await;

        let received = received.read().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].direction, Direction::Backward);
        assert_eq!(received[0].spike.sender(), handle.id());

        let status = handle.status().await.unwrap();
        assert_eq!(status.as_gen_spec().unwrap().last_input, vec![1, 0]);
        runtime.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_policy_stops_actor_after_protocol_error() {
        let mut runtime = ActonApp::launch_async().await;
        let services = RuntimeServices::new(&RuntimeConfig {
            error_policy: ErrorPolicy::StopActor,
            ..RuntimeConfig::default()
        });
        let parent = NeuronId::from_name("parent");
        let handle = leaf(parent).spawn(&mut runtime, &services).await.unwrap();

        handle
            .send_spike(Direction::Forward, Spike::multi_byte(parent, vec![1, 0, 1]))
            .await;
        services.wait_idle().await;

        let failures = services.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].protocol);
        assert_eq!(failures[0].name, "leaf");
        assert!(handle.status().await.is_err());
        runtime.shutdown_all().await.unwrap();
    }
}
