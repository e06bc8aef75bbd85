//! Actors hosting neurons on acton-reactive.
//!
//! ```text
//! present(grid) → InputTiling
//!   └─ MultiByte patch (Forward) → GenSpec children (concurrent)
//!       └─ Result{activation} (Backward) → parent GenSpec
//!           └─ WinnerSelected (Forward) → every child
//!               └─ winner only:
//!                   ├─ MultiByte last input (Forward) → its own children
//!                   └─ Result{1, is_leaf} (Forward) → Accumulator
//! ```
//!
//! Each actor owns its neuron and topology. Round state is touched only by the
//! parent's own handler, one message at a time.

mod neuron_actor;

pub use neuron_actor::{NeuronActor, NeuronActorState};
