//! Coverage of hardware structures and faults by one test program.

pub mod analysis;

pub use analysis::{HardwareCoverage, InstructionCoverage, InstructionSummary};

use crate::fault_space::{FaultToken, FaultUniverse};
use crate::mutant::{Category, MutantCampaign};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Canonical set of faults a test program detects.
///
/// Permanent and transient register faults on the same `(register, mask)`
/// collapse into one token; instruction-memory faults are keyed by the
/// faulted instruction definition, not its address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaultCoverageSet(BTreeSet<FaultToken>);

impl FaultCoverageSet {
    /// Coverage of the killed mutants of `campaign`.
    ///
    /// Tokens outside `universe` are dropped, so a program never covers a
    /// fault the architecture cannot suffer.
    #[must_use]
    pub fn from_campaign(campaign: &MutantCampaign, universe: &FaultUniverse) -> Self {
        let mut tokens = BTreeSet::new();
        let mut dropped = 0usize;
        for m in campaign.killed() {
            let token = match m.kind.category() {
                Category::Gpr => Some(FaultToken::Gpr {
                    number: m.target,
                    mask: m.mask,
                }),
                Category::Csr => Some(FaultToken::Csr {
                    number: m.target,
                    mask: m.mask,
                }),
                Category::InstructionMemory => m.edge.map(|e| FaultToken::Instruction {
                    id: e.source,
                    mask: m.mask,
                }),
                Category::InstructionFetchRegister => {
                    Some(FaultToken::FetchRegister { mask: m.mask })
                }
                Category::CoreMemory => Some(FaultToken::CoreMemory {
                    address: m.target,
                    mask: m.mask,
                }),
            };
            match token {
                Some(t) if universe.contains(&t) => {
                    tokens.insert(t);
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(
                program = campaign.name(),
                dropped, "killed mutants outside the fault universe"
            );
        }
        Self(tokens)
    }

    /// Number of covered faults
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is covered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `token` is covered
    #[must_use]
    pub fn contains(&self, token: &FaultToken) -> bool {
        self.0.contains(token)
    }

    /// Covered tokens in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &FaultToken> {
        self.0.iter()
    }

    /// Underlying token set
    #[must_use]
    pub const fn as_set(&self) -> &BTreeSet<FaultToken> {
        &self.0
    }
}

impl FromIterator<FaultToken> for FaultCoverageSet {
    fn from_iter<I: IntoIterator<Item = FaultToken>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FaultCoverageSet {
    type Item = &'a FaultToken;
    type IntoIter = std::collections::btree_set::Iter<'a, FaultToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
