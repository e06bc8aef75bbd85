//! Generalist/specialist neuron: weighted activation, winner-take-all
//! arbitration among siblings, and the rolling generalization factor.
//!
//! One neuron plays two roles in the protocol:
//!
//! ```text
//! parent (arbiter)                       child (candidate)
//!   │                                      │
//!   │  ◄──── Result{activation} ────────── │  forward pass on a new patch
//!   │  (collect until every child answered │
//!   │   and some activation was > 0)       │
//!   │                                      │
//!   │  ──── WinnerSelected{winner} ──────► │  every child updates its window;
//!   │                                      │  the winner forwards its patch to
//!   │                                      │  its own children and reports to
//!   │                                      │  the accumulator
//! ```
//!
//! Round state lives only in the parent and is mutated only by messages the
//! parent handles, so no cross-actor locking is needed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::GenSpecConfig;
use crate::error::{KernelError, KernelResult};
use crate::region::RegionContribution;
use crate::spike::{Direction, Function, Outbox, ResultArgs, WinnerSelectedArgs};
use crate::topology::{NeuronId, Topology};
use crate::window::GeneralizationWindow;

/// Window sample used when the diagnostic ratio is undefined.
pub const UNDEFINED_RATIO_SAMPLE: f64 = 0.0;

/// Active weight mass divided by activation, from the last forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DiagnosticRatio {
    Defined(f64),
    /// Activation was zero.
    #[default]
    Undefined,
}

impl DiagnosticRatio {
    pub fn compute(active_mass: f64, activation: f64) -> Self {
        if activation == 0.0 {
            Self::Undefined
        } else {
            Self::Defined(active_mass / activation)
        }
    }

    /// Value pushed into the generalization window after a round.
    ///
    /// Losers always contribute zero; an undefined ratio contributes
    /// [`UNDEFINED_RATIO_SAMPLE`].
    pub fn sample(self, won: bool) -> f64 {
        match self {
            _ if !won => 0.0,
            Self::Defined(ratio) => ratio,
            Self::Undefined => UNDEFINED_RATIO_SAMPLE,
        }
    }
}

/// Where a parent's arbitration round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// No result received since the last reset.
    Idle,
    /// Some children have not answered yet.
    AwaitingResults,
    /// Every child answered but none with positive activation.
    /// The round stays open until a positive result arrives.
    Stalled,
}

/// Winner-take-all bookkeeping for one parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRound {
    answered: usize,
    best_score: f64,
    best_child: Option<NeuronId>,
}

impl ArbitrationRound {
    /// Record one child's activation. Only a strictly greater score replaces
    /// the current best, so ties keep the earliest reporter.
    pub fn record(&mut self, child: NeuronId, score: f64) {
        if score > self.best_score {
            self.best_score = score;
            self.best_child = Some(child);
        }
        self.answered += 1;
    }

    /// Close the round if every child answered and a winner exists.
    /// Returns the winner and resets the round.
    pub fn conclude(&mut self, children: usize) -> Option<NeuronId> {
        if children == 0 || self.answered < children {
            return None;
        }
        let winner = self.best_child?;
        *self = Self::default();
        Some(winner)
    }

    pub fn phase(&self, children: usize) -> RoundPhase {
        if self.answered == 0 {
            RoundPhase::Idle
        } else if self.answered < children {
            RoundPhase::AwaitingResults
        } else {
            RoundPhase::Stalled
        }
    }

    /// Results received since the last reset.
    pub fn answered(&self) -> usize {
        self.answered
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_child(&self) -> Option<NeuronId> {
        self.best_child
    }
}

/// Extension point invoked when a neuron wins a round.
///
/// Synapses are read-only inside the kernel; a learning rule implemented here
/// sees the winning input and activation.
pub trait WeightUpdateHook: Send + Sync {
    /// Unique name for this hook.
    fn name(&self) -> &str;

    /// Called once per win, before the winning input is propagated.
    fn on_win(&self, neuron: NeuronId, input: &[u8], activation: f64);
}

/// State of one generalist/specialist neuron.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GenSpecNeuron {
    threshold: f32,
    input_width: usize,
    input_height: usize,
    accumulator: Option<NeuronId>,
    /// Most recent forward-pass input, overwritten in place
    last_input: Vec<u8>,
    /// Mean absolute change between the previous and the latest input
    input_difference: f32,
    activation: f64,
    ratio: DiagnosticRatio,
    is_winner: bool,
    round: ArbitrationRound,
    window: GeneralizationWindow,
}

impl fmt::Debug for GenSpecNeuron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenSpecNeuron")
            .field("threshold", &self.threshold)
            .field("input_len", &self.last_input.len())
            .field("accumulator", &self.accumulator)
            .field("activation", &self.activation)
            .field("is_winner", &self.is_winner)
            .field("answered", &self.round.answered())
            .field("generalization_factor", &self.window.factor())
            .finish()
    }
}

impl GenSpecNeuron {
    /// Build a neuron from its configuration.
    ///
    /// `accumulator` is the resolved id of `config.accumulator`; it is absent
    /// only for the topmost generalist.
    pub fn new(config: &GenSpecConfig, accumulator: Option<NeuronId>) -> KernelResult<Self> {
        if !config.synapse_threshold.is_finite() {
            return Err(KernelError::config(format!(
                "gen_spec: synapse_threshold must be finite, got {}",
                config.synapse_threshold
            )));
        }
        if config.input_width == 0 || config.input_height == 0 {
            return Err(KernelError::config(format!(
                "gen_spec: input size {}x{} must be positive",
                config.input_width, config.input_height
            )));
        }
        let input_len = config.input_len()?;
        let window = GeneralizationWindow::new(config.generalization_window.unwrap_or(1))?;

        Ok(Self {
            threshold: config.synapse_threshold,
            input_width: config.input_width,
            input_height: config.input_height,
            accumulator,
            last_input: vec![0; input_len],
            input_difference: 0.0,
            activation: 0.0,
            ratio: DiagnosticRatio::Undefined,
            is_winner: false,
            round: ArbitrationRound::default(),
            window,
        })
    }

    /// Forward pass: compute the activation for `values` arriving over the
    /// synapse from `sender` and report it to the parent.
    pub fn on_input(
        &mut self,
        topology: &Topology,
        sender: NeuronId,
        values: &[u8],
        outbox: &mut Outbox,
    ) -> KernelResult<()> {
        let weights = topology.input_synapse(sender)?.weights();
        if weights.len() != self.last_input.len() {
            return Err(KernelError::WeightCountMismatch {
                sender,
                expected: self.last_input.len(),
                actual: weights.len(),
            });
        }
        if values.len() != weights.len() {
            return Err(KernelError::PatchLengthMismatch {
                sender,
                expected: weights.len(),
                actual: values.len(),
            });
        }
        let parent = topology.parent().ok_or(KernelError::MissingParent(topology.id()))?;

        self.input_difference = input_difference(&self.last_input, values);
        self.last_input.copy_from_slice(values);

        let (activation, active_mass) = activation(weights, values, self.threshold);
        self.activation = activation;
        self.ratio = DiagnosticRatio::compute(active_mass, activation);

        debug!(
            neuron = %topology.name(),
            sender = %sender,
            activation,
            input_difference = self.input_difference,
            "Received input"
        );

        outbox.send_functional(
            parent,
            Direction::Backward,
            Function::Result(ResultArgs {
                result: activation,
                is_leaf: topology.is_leaf(),
            }),
        );
        Ok(())
    }

    /// Arbitration: a child reported its activation.
    pub fn on_result(&mut self, topology: &Topology, child: NeuronId, score: f64, outbox: &mut Outbox) {
        if !topology.children().contains(&child) {
            debug!(
                neuron = %topology.name(),
                sender = %child,
                "Ignoring result from a neuron that is not a child"
            );
            return;
        }
        self.round.record(child, score);
        trace!(
            neuron = %topology.name(),
            child = %child,
            score,
            answered = self.round.answered(),
            children = topology.children().len(),
            "Child result recorded"
        );

        let Some(winner) = self.round.conclude(topology.children().len()) else {
            if self.round.phase(topology.children().len()) == RoundPhase::Stalled {
                debug!(
                    neuron = %topology.name(),
                    answered = self.round.answered(),
                    "Round stalled: no positive activation yet"
                );
            }
            return;
        };

        info!(neuron = %topology.name(), winner = %winner, "Winner selected");
        for &child in topology.children() {
            outbox.send_functional(
                child,
                Direction::Forward,
                Function::WinnerSelected(WinnerSelectedArgs { winner }),
            );
        }
    }

    /// Winner notification from the parent's round.
    pub fn on_winner_selected(
        &mut self,
        topology: &Topology,
        winner: NeuronId,
        outbox: &mut Outbox,
        hook: Option<&dyn WeightUpdateHook>,
    ) -> KernelResult<()> {
        let won = winner == topology.id();
        self.is_winner = won;

        let mut missing_accumulator = false;
        if won {
            debug!(neuron = %topology.name(), activation = self.activation, "Won round");
            if let Some(hook) = hook {
                hook.on_win(topology.id(), &self.last_input, self.activation);
            }
            for &child in topology.children() {
                outbox.send_multi_byte(child, Direction::Forward, self.last_input.clone());
            }
            match self.accumulator {
                Some(accumulator) => outbox.send_functional(
                    accumulator,
                    Direction::Forward,
                    Function::Result(ResultArgs {
                        result: 1.0,
                        is_leaf: topology.is_leaf(),
                    }),
                ),
                None => missing_accumulator = true,
            }
        }

        self.window.push(self.ratio.sample(won));

        if missing_accumulator {
            return Err(KernelError::MissingAccumulator(topology.id()));
        }
        Ok(())
    }

    /// Generalization factor and leaf flag, for external aggregation.
    pub fn region_contribution(&self, topology: &Topology) -> RegionContribution {
        RegionContribution {
            generalization_factor: self.window.factor() as f32,
            is_leaf: topology.is_leaf(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn input_size(&self) -> (usize, usize) {
        (self.input_width, self.input_height)
    }

    pub fn input_len(&self) -> usize {
        self.last_input.len()
    }

    pub fn accumulator(&self) -> Option<NeuronId> {
        self.accumulator
    }

    pub fn last_input(&self) -> &[u8] {
        &self.last_input
    }

    pub fn input_difference(&self) -> f32 {
        self.input_difference
    }

    pub fn activation(&self) -> f64 {
        self.activation
    }

    pub fn ratio(&self) -> DiagnosticRatio {
        self.ratio
    }

    pub fn is_winner(&self) -> bool {
        self.is_winner
    }

    pub fn round(&self) -> &ArbitrationRound {
        &self.round
    }

    pub fn window(&self) -> &GeneralizationWindow {
        &self.window
    }

    pub fn generalization_factor(&self) -> f64 {
        self.window.factor()
    }
}

/// Weighted activation and active weight mass over the same index range.
///
/// An input counts toward the activation only when its weight is strictly
/// above `threshold`; the mass sums every weight.
pub fn activation(weights: &[f32], values: &[u8], threshold: f32) -> (f64, f64) {
    weights
        .iter()
        .zip(values)
        .fold((0.0, 0.0), |(activation, mass), (&weight, &value)| {
            let passed = if weight > threshold { f64::from(value) } else { 0.0 };
            (activation + passed, mass + f64::from(weight))
        })
}

/// Mean absolute per-element difference between two equally sized inputs.
pub fn input_difference(previous: &[u8], current: &[u8]) -> f32 {
    if previous.is_empty() {
        return 0.0;
    }
    let total: u32 = previous
        .iter()
        .zip(current)
        .map(|(&a, &b)| u32::from(a.abs_diff(b)))
        .sum();
    total as f32 / previous.len() as f32
}
