//! Region contributions: the per-neuron record collected by an external
//! aggregator after a run.

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

/// Encoded size of a [`RegionContribution`].
pub const CONTRIBUTION_LEN: usize = 5;

/// Generalization factor plus leaf flag of one GenSpec neuron.
///
/// Wire layout: `f32` little-endian factor followed by one byte, `1` for a
/// leaf and `0` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionContribution {
    pub generalization_factor: f32,
    pub is_leaf: bool,
}

impl RegionContribution {
    pub fn to_bytes(&self) -> [u8; CONTRIBUTION_LEN] {
        let mut out = [0u8; CONTRIBUTION_LEN];
        out[..4].copy_from_slice(&self.generalization_factor.to_le_bytes());
        out[4] = u8::from(self.is_leaf);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> KernelResult<Self> {
        let Ok(raw) = <[u8; CONTRIBUTION_LEN]>::try_from(bytes) else {
            return Err(KernelError::Runtime(format!(
                "region contribution must be {CONTRIBUTION_LEN} bytes, got {}",
                bytes.len()
            )));
        };
        Ok(Self {
            generalization_factor: f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            is_leaf: raw[4] != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_factor_then_leaf_byte() {
        let contribution = RegionContribution {
            generalization_factor: 0.5,
            is_leaf: true,
        };
        let bytes = contribution.to_bytes();
        assert_eq!(&bytes[..4], &0.5f32.to_le_bytes());
        assert_eq!(bytes[4], 1);
        assert_eq!(RegionContribution::from_bytes(&bytes).unwrap(), contribution);
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(RegionContribution::from_bytes(&[0, 0, 0]).is_err());
    }
}
