//! Fault-space enumeration.
//!
//! A fault is a bitmask of simultaneously flipped bits. [`enumerate`] lists
//! every such mask up to a multiplicity limit; [`FaultSpace`] specialises the
//! enumeration per structure of an architecture, optionally driven by a
//! [`FaultRestrictionSource`] with layout-derived legal masks.

mod restriction;
mod space;
mod universe;

pub use restriction::{FaultOverride, FaultRestrictionSource, NaiveEnumeration};
pub use space::{FaultSpace, DEFAULT_REGION_CEILING};
pub use universe::{parse_tokens, FaultToken, FaultUniverse, UncoveredFaults};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Faultable hardware structure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// General-purpose register
    Gpr,
    /// Control and status register
    Csr,
    /// Memory-mapped device CSR
    DeviceCsr,
    /// Instruction memory (one instruction encoding)
    InstructionMemory,
    /// Instruction-fetch register
    InstructionFetchRegister,
    /// Core memory byte
    CoreMemory,
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gpr => "GPR",
            Self::Csr => "CSR",
            Self::DeviceCsr => "MMCSR",
            Self::InstructionMemory => "IMEM",
            Self::InstructionFetchRegister => "IFR",
            Self::CoreMemory => "COREMEM",
        };
        f.write_str(name)
    }
}

/// Every mask formed by OR-ing `k` distinct bit positions below `bits`,
/// for `k` in `1..=limit`, sorted ascending.
///
/// `bits` is clamped to 64 and `limit` to `bits`.
///
/// ```
/// assert_eq!(faultcov::enumerate(4, 2), vec![1, 2, 3, 4, 5, 6, 8, 9, 10, 12]);
/// ```
#[must_use]
pub fn enumerate(bits: u32, limit: u32) -> Vec<u64> {
    let bits = bits.min(64);
    let limit = limit.min(bits);
    let mut masks: Vec<u64> = (1..=limit)
        .flat_map(|k| {
            (0..bits)
                .combinations(k as usize)
                .map(|positions| positions.into_iter().fold(0u64, |m, b| m | (1u64 << b)))
        })
        .collect();
    masks.sort_unstable();
    masks
}

/// Number of masks [`enumerate`] yields: `C(bits, 1) + ... + C(bits, limit)`
#[must_use]
pub fn enumeration_size(bits: u32, limit: u32) -> u64 {
    let bits = bits.min(64);
    (1..=limit.min(bits)).map(|k| binomial(bits, k)).sum()
}

/// Binomial coefficient `C(n, k)`, saturating on overflow
#[must_use]
pub fn binomial(n: u32, k: u32) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u64, |acc, i| {
        acc.saturating_mul(u64::from(n - i)) / u64::from(i + 1)
    })
}

/// `mask` intersected with every enumerated fault, zero results dropped
#[must_use]
pub fn restrict_to_mask(faults: &[u64], mask: u64) -> std::collections::BTreeSet<u64> {
    faults
        .iter()
        .map(|e| e & mask)
        .filter(|&e| e != 0)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod enumerate_tests {
        use super::*;

        #[test]
        fn test_enumerate_4_2() {
            assert_eq!(enumerate(4, 2), vec![1, 2, 3, 4, 5, 6, 8, 9, 10, 12]);
        }

        #[test]
        fn test_enumerate_single_bit() {
            let masks = enumerate(8, 1);
            assert_eq!(masks, vec![1, 2, 4, 8, 16, 32, 64, 128]);
        }

        #[test]
        fn test_enumerate_32_bits() {
            let masks = enumerate(32, 2);
            assert_eq!(masks.len(), 32 + 496);
            assert_eq!(*masks.last().unwrap(), 0xC000_0000);
        }

        #[test]
        fn test_enumerate_zero_limit() {
            assert!(enumerate(32, 0).is_empty());
            assert!(enumerate(0, 3).is_empty());
        }

        #[test]
        fn test_enumerate_limit_above_width() {
            assert_eq!(enumerate(3, 5).len(), 7);
        }

        #[test]
        fn test_enumerate_64_bits_top_bit() {
            let masks = enumerate(64, 1);
            assert_eq!(masks.len(), 64);
            assert_eq!(masks[63], 1u64 << 63);
        }
    }

    mod binomial_tests {
        use super::*;

        #[test]
        fn test_binomial_values() {
            assert_eq!(binomial(32, 0), 1);
            assert_eq!(binomial(32, 1), 32);
            assert_eq!(binomial(32, 2), 496);
            assert_eq!(binomial(4, 5), 0);
        }

        #[test]
        fn test_enumeration_size_matches_enumerate() {
            for bits in [4, 8, 16] {
                for limit in 0..=3 {
                    assert_eq!(enumeration_size(bits, limit), enumerate(bits, limit).len() as u64);
                }
            }
        }
    }

    #[test]
    fn test_restrict_to_mask_dedups_and_drops_zero() {
        let restricted = restrict_to_mask(&enumerate(8, 2), 0x88);
        assert_eq!(restricted.into_iter().collect::<Vec<_>>(), vec![0x08, 0x80, 0x88]);
    }

    #[test]
    fn test_structure_kind_display() {
        assert_eq!(StructureKind::InstructionFetchRegister.to_string(), "IFR");
    }
}
