//! Accumulator: the sink winners report to.
//!
//! Tallies `Result` reports and sends nothing.

use serde::{Deserialize, Serialize};

use crate::spike::ResultArgs;
use crate::topology::NeuronId;

/// Reports received from one sender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SenderTally {
    pub sender: NeuronId,
    pub reports: u64,
}

/// Running totals of winner reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorNeuron {
    /// Sum of reported results
    activations: f64,
    /// Sum of results reported by leaves
    leaf_activations: f64,
    /// Number of reports received
    reports: u64,
    /// Per-sender counts, in order of first report
    senders: Vec<SenderTally>,
}

impl AccumulatorNeuron {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_result(&mut self, sender: NeuronId, args: ResultArgs) {
        self.activations += args.result;
        if args.is_leaf {
            self.leaf_activations += args.result;
        }
        self.reports += 1;
        match self.senders.iter_mut().find(|t| t.sender == sender) {
            Some(tally) => tally.reports += 1,
            None => self.senders.push(SenderTally { sender, reports: 1 }),
        }
    }

    pub fn activations(&self) -> f64 {
        self.activations
    }

    pub fn leaf_activations(&self) -> f64 {
        self.leaf_activations
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }

    pub fn senders(&self) -> &[SenderTally] {
        &self.senders
    }

    /// Reports received from `sender`.
    pub fn reports_from(&self, sender: NeuronId) -> u64 {
        self.senders
            .iter()
            .find(|t| t.sender == sender)
            .map_or(0, |t| t.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tallies_by_sender_and_leaf_flag() {
        let leaf = NeuronId::from_name("leaf");
        let inner = NeuronId::from_name("inner");
        let mut sink = AccumulatorNeuron::new();

        sink.on_result(leaf, ResultArgs { result: 1.0, is_leaf: true });
        sink.on_result(inner, ResultArgs { result: 1.0, is_leaf: false });
        sink.on_result(leaf, ResultArgs { result: 1.0, is_leaf: true });

        assert_eq!(sink.reports(), 3);
        assert_eq!(sink.activations(), 3.0);
        assert_eq!(sink.leaf_activations(), 2.0);
        assert_eq!(sink.reports_from(leaf), 2);
        assert_eq!(sink.reports_from(inner), 1);
        assert_eq!(sink.reports_from(NeuronId::EXTERNAL), 0);
        assert_eq!(sink.senders()[0].sender, leaf);
    }
}
