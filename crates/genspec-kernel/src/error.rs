//! Error types for the GenSpec kernel.
//!
//! Configuration errors abort construction. Protocol errors are raised while
//! handling a spike whose shape does not match the receiving neuron; the
//! runtime's [`ErrorPolicy`](crate::config::ErrorPolicy) decides what happens
//! to the actor afterwards.

use thiserror::Error;

use crate::topology::NeuronId;

/// Main error type for kernel operations.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Missing or invalid configuration parameter.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No input synapse registered for the sender of a forward spike.
    #[error("No input synapse from {sender} to {neuron}")]
    MissingSynapse { neuron: NeuronId, sender: NeuronId },

    /// Synapse weight count differs from the neuron's input size.
    #[error("Synapse from {sender} carries {actual} weights, neuron expects {expected}")]
    WeightCountMismatch {
        sender: NeuronId,
        expected: usize,
        actual: usize,
    },

    /// Patch length differs from the synapse weight count.
    #[error("Patch from {sender} has {actual} values, expected {expected}")]
    PatchLengthMismatch {
        sender: NeuronId,
        expected: usize,
        actual: usize,
    },

    /// Full input grid length differs from the declared grid extent.
    #[error("Input grid has {actual} values, tiling layout declares {expected}")]
    InputLengthMismatch { expected: usize, actual: usize },

    /// A neuron had to report upward but has no parent.
    #[error("Neuron {0} has no parent to report to")]
    MissingParent(NeuronId),

    /// A winner had to report to the accumulator but none is configured.
    #[error("Neuron {0} won a round but has no accumulator")]
    MissingAccumulator(NeuronId),

    /// Actor task failure (join error, closed mailbox).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Snapshot pack/unpack error.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// IO error while loading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error was caused by a malformed or misrouted spike.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::MissingSynapse { .. }
                | Self::WeightCountMismatch { .. }
                | Self::PatchLengthMismatch { .. }
                | Self::InputLengthMismatch { .. }
                | Self::MissingParent(_)
                | Self::MissingAccumulator(_)
        )
    }

    /// Whether this error is a configuration failure.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let config = KernelError::config("synapse_threshold missing");
        assert!(config.is_config());
        assert!(!config.is_protocol());

        let shape = KernelError::PatchLengthMismatch {
            sender: NeuronId::EXTERNAL,
            expected: 4,
            actual: 3,
        };
        assert!(shape.is_protocol());
        assert!(!shape.is_config());
        assert!(shape.to_string().contains("expected 4"));
    }
}
