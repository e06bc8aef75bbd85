//! Services shared by the neuron actors of one network.
//!
//! ```text
//! NeuronHandle::send_spike ──► acton inbox ──► mutate_on::<DeliverSpike>
//!        ▲                                       │ handle one spike
//!        │                                       ▼
//!   RuntimeServices::route ◄──────────────── Outbox::drain
//! ```
//!
//! Actors are hosted on acton-reactive; this module adds what a spike network
//! needs on top of it. The directory maps neuron ids to actor handles, the
//! failure log records handler errors, and the in-flight tracker counts every
//! spike accepted into an inbox and not yet handled. A handler delivers the
//! spikes it emits before its own spike is released, so the count only
//! reaches zero once the network has nothing left to do.

use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use acton_reactive::prelude::*;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::{ErrorPolicy, RuntimeConfig};
use crate::error::{KernelError, KernelResult};
use crate::messages::{DeliverSpike, QueryContribution, QueryStatus, TakeSnapshot};
use crate::neuron::NeuronStatus;
use crate::snapshot::NeuronSnapshot;
use crate::spike::{Direction, Outgoing, Spike};
use crate::topology::NeuronId;

/// Quiescence counter shared by every actor of a network.
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    idle: tokio::sync::Notify,
}

impl InFlight {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Spikes accepted and not yet handled.
    pub fn pending(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolve once no spike is queued or being handled.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.idle.notified());
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Routing table from neuron id to actor handle.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    actors: Arc<DashMap<NeuronId, ActorHandle>>,
}

impl Directory {
    pub fn get(&self, id: NeuronId) -> Option<ActorHandle> {
        self.actors.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    fn insert(&self, id: NeuronId, handle: ActorHandle) {
        self.actors.insert(id, handle);
    }
}

/// A handler error recorded while the network ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub neuron: NeuronId,
    pub name: String,
    pub message: String,
    pub protocol: bool,
}

/// Directory, tracker, failure log and policy of one network.
#[derive(Debug, Clone)]
pub struct RuntimeServices {
    directory: Directory,
    tracker: Arc<InFlight>,
    failures: Arc<Mutex<Vec<HandlerFailure>>>,
    policy: ErrorPolicy,
    inbox_capacity: usize,
}

impl RuntimeServices {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            directory: Directory::default(),
            tracker: Arc::new(InFlight::default()),
            failures: Arc::new(Mutex::new(Vec::new())),
            policy: config.error_policy,
            inbox_capacity: config.inbox_capacity,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn inbox_capacity(&self) -> usize {
        self.inbox_capacity
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn tracker(&self) -> Arc<InFlight> {
        self.tracker.clone()
    }

    /// Make `handle` reachable under `id` for routed spikes.
    pub fn register(&self, id: NeuronId, handle: ActorHandle) {
        self.directory.insert(id, handle);
    }

    /// Deliver a spike to `receiver`, counting it as in flight until its
    /// handler finishes. Returns false when the receiver's inbox is closed.
    pub async fn deliver(&self, receiver: &ActorHandle, direction: Direction, spike: Spike) -> bool {
        self.tracker.begin();
        let envelope = receiver.create_envelope(Some(receiver.reply_address()));
        match envelope.try_send(DeliverSpike { direction, spike }).await {
            Ok(()) => true,
            Err(e) => {
                self.tracker.finish();
                debug!(receiver = %receiver.id(), error = %e, "Dropping spike for stopped actor");
                false
            }
        }
    }

    /// Deliver a spike queued by a handler.
    pub async fn route(&self, outgoing: Outgoing) {
        match self.directory.get(outgoing.receiver) {
            Some(receiver) => {
                self.deliver(&receiver, outgoing.direction, outgoing.spike).await;
            }
            None => warn!(
                receiver = %outgoing.receiver,
                sender = %outgoing.spike.sender(),
                "No actor registered for receiver, dropping spike"
            ),
        }
    }

    /// Mark one delivered spike as fully handled.
    pub fn finish(&self) {
        self.tracker.finish();
    }

    /// Resolve once every inbox is free of spikes and no handler is running.
    pub async fn wait_idle(&self) {
        self.tracker.wait_idle().await;
    }

    pub fn record_failure(&self, neuron: NeuronId, name: &str, error: &KernelError) {
        let failure = HandlerFailure {
            neuron,
            name: name.to_string(),
            message: error.to_string(),
            protocol: error.is_protocol(),
        };
        match self.failures.lock() {
            Ok(mut failures) => failures.push(failure),
            Err(poisoned) => poisoned.into_inner().push(failure),
        }
    }

    /// Handler failures recorded so far, oldest first.
    pub fn failures(&self) -> Vec<HandlerFailure> {
        match self.failures.lock() {
            Ok(failures) => failures.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Handle to one spawned neuron actor.
#[derive(Debug, Clone)]
pub struct NeuronHandle {
    id: NeuronId,
    name: Arc<str>,
    actor: ActorHandle,
    services: RuntimeServices,
}

impl NeuronHandle {
    pub(crate) fn new(id: NeuronId, name: &str, actor: ActorHandle, services: RuntimeServices) -> Self {
        Self {
            id,
            name: Arc::from(name),
            actor,
            services,
        }
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying acton actor handle.
    pub fn actor(&self) -> &ActorHandle {
        &self.actor
    }

    /// Deliver a spike. A stopped actor drops it.
    pub async fn send_spike(&self, direction: Direction, spike: Spike) -> bool {
        self.services.deliver(&self.actor, direction, spike).await
    }

    fn ask_failed(&self, error: AskError) -> KernelError {
        KernelError::Runtime(format!("actor {} did not answer: {error}", self.name))
    }

    pub async fn status(&self) -> KernelResult<NeuronStatus> {
        self.actor.ask(QueryStatus).await.map_err(|e| self.ask_failed(e))
    }

    pub async fn contribution(&self) -> KernelResult<Vec<u8>> {
        self.actor
            .ask(QueryContribution)
            .await
            .map(|bytes| bytes.0)
            .map_err(|e| self.ask_failed(e))
    }

    pub async fn snapshot(&self) -> KernelResult<NeuronSnapshot> {
        self.actor.ask(TakeSnapshot).await.map_err(|e| self.ask_failed(e))
    }
}
