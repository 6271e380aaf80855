//! Mutants: concrete fault-injection experiments.
//!
//! A [`MutantCampaign`] owns the deduplicated mutants of one test program,
//! filled in batches by [`MutantGenerator`] and later annotated with the
//! simulator's detection results.

mod artifact;
mod generator;

pub use artifact::{
    parse_golden_time, parse_results, write_mutant_list, SimulationOutcome, SimulationResults,
    NOT_KILLED, TIMEOUT,
};
pub use generator::{GenerationReport, MutantGenerator, MutantSink, DEFAULT_BATCH_SIZE};

use crate::fault_edges::InstructionFaultEdge;
use crate::result::{FaultcovError, FaultcovResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Faulted structure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// General-purpose register
    Gpr,
    /// Control and status register
    Csr,
    /// Instruction memory
    InstructionMemory,
    /// Instruction-fetch register
    InstructionFetchRegister,
    /// Core memory
    CoreMemory,
}

/// How long a fault stays active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permanence {
    /// Bits inverted for the whole run
    PermanentFlip,
    /// Bits forced to 0 for the whole run
    PermanentStuckAt0,
    /// Bits forced to 1 for the whole run
    PermanentStuckAt1,
    /// Bits inverted at one dynamic access
    TransientFlip,
}

/// Valid `(category, permanence)` pair with its simulator wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutantKind {
    category: Category,
    permanence: Permanence,
}

impl MutantKind {
    /// `None` for transient faults outside GPR/CSR
    #[must_use]
    pub const fn new(category: Category, permanence: Permanence) -> Option<Self> {
        match (category, permanence) {
            (Category::Gpr | Category::Csr, _) | (_, Permanence::PermanentFlip)
            | (_, Permanence::PermanentStuckAt0) | (_, Permanence::PermanentStuckAt1) => {
                Some(Self {
                    category,
                    permanence,
                })
            }
            _ => None,
        }
    }

    /// Structure category
    #[must_use]
    pub const fn category(self) -> Category {
        self.category
    }

    /// Fault duration
    #[must_use]
    pub const fn permanence(self) -> Permanence {
        self.permanence
    }

    /// Simulator kind code
    #[must_use]
    pub const fn code(self) -> u32 {
        let base = match self.category {
            Category::Gpr => 1,
            Category::Csr => 3,
            Category::InstructionMemory => 5,
            Category::InstructionFetchRegister => 7,
            Category::CoreMemory => 8,
        };
        match self.permanence {
            Permanence::PermanentFlip => base,
            Permanence::PermanentStuckAt0 => base * 10,
            Permanence::PermanentStuckAt1 => base * 10 + 1,
            Permanence::TransientFlip => base + 1,
        }
    }

    /// Inverse of [`code`](Self::code)
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        let (category, permanence) = match code {
            1 => (Category::Gpr, Permanence::PermanentFlip),
            10 => (Category::Gpr, Permanence::PermanentStuckAt0),
            11 => (Category::Gpr, Permanence::PermanentStuckAt1),
            2 => (Category::Gpr, Permanence::TransientFlip),
            3 => (Category::Csr, Permanence::PermanentFlip),
            30 => (Category::Csr, Permanence::PermanentStuckAt0),
            31 => (Category::Csr, Permanence::PermanentStuckAt1),
            4 => (Category::Csr, Permanence::TransientFlip),
            5 => (Category::InstructionMemory, Permanence::PermanentFlip),
            50 => (Category::InstructionMemory, Permanence::PermanentStuckAt0),
            51 => (Category::InstructionMemory, Permanence::PermanentStuckAt1),
            7 => (Category::InstructionFetchRegister, Permanence::PermanentFlip),
            70 => (Category::InstructionFetchRegister, Permanence::PermanentStuckAt0),
            71 => (Category::InstructionFetchRegister, Permanence::PermanentStuckAt1),
            8 => (Category::CoreMemory, Permanence::PermanentFlip),
            80 => (Category::CoreMemory, Permanence::PermanentStuckAt0),
            81 => (Category::CoreMemory, Permanence::PermanentStuckAt1),
            _ => return None,
        };
        Some(Self {
            category,
            permanence,
        })
    }
}

impl fmt::Display for MutantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Mutant before it receives an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutantRecord {
    /// Kind
    pub kind: MutantKind,
    /// Register number or address
    pub target: u64,
    /// Dynamic access index, 0 for permanent faults
    pub access_index: u64,
    /// Faulted bits
    pub mask: u64,
    /// Decode-level effect, instruction-memory faults only
    pub edge: Option<InstructionFaultEdge>,
}

impl MutantRecord {
    fn key(&self) -> MutantKey {
        (self.kind, self.target, self.mask, self.access_index)
    }
}

type MutantKey = (MutantKind, u64, u64, u64);

/// One fault-injection experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutant {
    /// Sequential id within the campaign, starting at 1
    pub id: u64,
    /// Kind
    pub kind: MutantKind,
    /// Register number or address
    pub target: u64,
    /// Dynamic access index, 0 for permanent faults
    pub access_index: u64,
    /// Faulted bits
    pub mask: u64,
    /// Decode-level effect, instruction-memory faults only
    pub edge: Option<InstructionFaultEdge>,
    /// Simulator verdict, `None` until results are attached
    pub detection: Option<String>,
    /// Simulated run time in microseconds
    pub runtime_us: u64,
}

impl Mutant {
    /// Whether the simulator detected the fault
    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.detection.as_deref().is_some_and(is_killed)
    }
}

/// Whether a detection label counts as detected
#[must_use]
pub fn is_killed(label: &str) -> bool {
    label != NOT_KILLED && label != TIMEOUT
}

/// Categories and permanence kinds a campaign generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignOptions {
    /// GPR faults
    pub gpr: bool,
    /// CSR faults
    pub csr: bool,
    /// Instruction-memory faults
    pub imem: bool,
    /// Core-memory faults
    pub coremem: bool,
    /// Instruction-fetch register faults
    pub ifr: bool,
    /// Permanent bit flips
    pub flip: bool,
    /// Permanent stuck-at-0/1 faults
    pub stuck_at: bool,
    /// Transient GPR/CSR flips
    pub transient: bool,
}

impl Default for CampaignOptions {
    fn default() -> Self {
        Self {
            gpr: true,
            csr: true,
            imem: true,
            coremem: false,
            ifr: true,
            flip: true,
            stuck_at: true,
            transient: false,
        }
    }
}

/// Deduplicated mutants of one test program
#[derive(Debug, Clone, Default)]
pub struct MutantCampaign {
    name: String,
    options: CampaignOptions,
    mutants: Vec<Mutant>,
    keys: HashSet<MutantKey>,
    skipped: u64,
    golden_time_us: Option<u64>,
}

impl MutantCampaign {
    /// Empty campaign
    #[must_use]
    pub fn new(name: impl Into<String>, options: CampaignOptions) -> Self {
        Self {
            name: name.into(),
            options,
            ..Self::default()
        }
    }

    /// Test program name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generation toggles
    #[must_use]
    pub const fn options(&self) -> CampaignOptions {
        self.options
    }

    /// Mutants in id order
    #[must_use]
    pub fn mutants(&self) -> &[Mutant] {
        &self.mutants
    }

    /// Mutant by id
    #[must_use]
    pub fn mutant(&self, id: u64) -> Option<&Mutant> {
        let idx = usize::try_from(id.checked_sub(1)?).ok()?;
        self.mutants.get(idx)
    }

    /// Number of mutants
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutants.len()
    }

    /// Whether no mutant was generated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutants.is_empty()
    }

    /// Structures skipped during generation
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    pub(crate) fn add_skipped(&mut self, n: u64) {
        self.skipped += n;
    }

    /// Golden-run duration reported by the simulator
    #[must_use]
    pub const fn golden_time_us(&self) -> Option<u64> {
        self.golden_time_us
    }

    /// Detected mutants
    pub fn killed(&self) -> impl Iterator<Item = &Mutant> {
        self.mutants.iter().filter(|m| m.is_killed())
    }

    /// Number of mutants per kind code
    #[must_use]
    pub fn count_by_kind(&self) -> std::collections::BTreeMap<u32, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for m in &self.mutants {
            *counts.entry(m.kind.code()).or_insert(0) += 1;
        }
        counts
    }

    /// Attach simulator verdicts.
    ///
    /// Ids unknown to the campaign are logged and ignored. Returns the number
    /// of mutants updated.
    pub fn apply_results(&mut self, results: &SimulationResults) -> usize {
        if results.golden_time_us.is_some() {
            self.golden_time_us = results.golden_time_us;
        }
        let mut updated = 0;
        for (&id, outcome) in &results.outcomes {
            let Some(idx) = id
                .checked_sub(1)
                .and_then(|i| usize::try_from(i).ok())
                .filter(|&i| i < self.mutants.len())
            else {
                warn!(id, "result for unknown mutant ignored");
                continue;
            };
            let mutant = &mut self.mutants[idx];
            mutant.detection = Some(outcome.result.clone());
            mutant.runtime_us = outcome.duration_us;
            updated += 1;
        }
        updated
    }

    /// Fail unless `results` holds a verdict for every mutant; the campaign
    /// is left untouched either way
    pub fn check_results(&self, results: &SimulationResults) -> FaultcovResult<()> {
        let missing = self
            .mutants
            .iter()
            .filter(|m| !results.outcomes.contains_key(&m.id))
            .count();
        if missing == 0 {
            Ok(())
        } else {
            Err(FaultcovError::artifact(format!(
                "{missing} of {} mutants have no result",
                self.mutants.len()
            )))
        }
    }

    /// Fail unless every mutant has a verdict
    pub fn ensure_complete(&self) -> FaultcovResult<()> {
        let missing = self.mutants.iter().filter(|m| m.detection.is_none()).count();
        if missing == 0 {
            Ok(())
        } else {
            Err(FaultcovError::artifact(format!(
                "{missing} of {} mutants have no result",
                self.mutants.len()
            )))
        }
    }
}

impl MutantSink for MutantCampaign {
    fn insert_batch(&mut self, batch: &mut Vec<MutantRecord>) -> usize {
        let before = self.mutants.len();
        for record in batch.drain(..) {
            if self.keys.insert(record.key()) {
                self.mutants.push(Mutant {
                    id: self.mutants.len() as u64 + 1,
                    kind: record.kind,
                    target: record.target,
                    access_index: record.access_index,
                    mask: record.mask,
                    edge: record.edge,
                    detection: None,
                    runtime_us: 0,
                });
            }
        }
        self.mutants.len() - before
    }
}
