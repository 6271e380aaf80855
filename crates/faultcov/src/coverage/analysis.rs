//! Which hardware structures a golden run exercises.

use crate::catalog::{ArchitectureModel, InstructionId};
use crate::trace::{AccessSummary, DecodedTrace, RegisterClassification};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Executions of one instruction definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstructionCoverage {
    /// Dynamic executions
    pub executions: u64,
    /// Distinct addresses holding the instruction
    pub instances: u64,
}

/// Hardware coverage of one test program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HardwareCoverage {
    /// Accessed GPRs
    pub gprs: BTreeMap<u64, AccessSummary>,
    /// Referenced FPRs
    pub fprs: BTreeSet<u64>,
    /// Accessed CSRs known to the catalog
    pub csrs: BTreeMap<u64, AccessSummary>,
    /// Accesses summed per memory region name
    pub memory_regions: BTreeMap<String, AccessSummary>,
    /// Accesses summed per device CSR name
    pub device_csrs: BTreeMap<String, AccessSummary>,
    /// Memory accesses matching neither a region nor a device CSR
    pub unmatched_accesses: u64,
    /// Executed instructions
    pub instructions: BTreeMap<InstructionId, InstructionCoverage>,
    /// Referenced register names by register file
    pub registers: RegisterClassification,
}

impl HardwareCoverage {
    /// Analyse a decoded trace against its catalog
    #[must_use]
    pub fn analyze(arch: &ArchitectureModel, trace: &DecodedTrace) -> Self {
        let mut cov = Self {
            registers: trace.classify_registers(arch),
            ..Self::default()
        };

        cov.gprs = trace
            .gpr_accesses()
            .iter()
            .filter(|(_, s)| s.is_accessed())
            .map(|(&n, &s)| (n, s))
            .collect();
        cov.fprs = cov.registers.fprs.clone();

        for (&number, &summary) in trace.csr_accesses() {
            if arch.csr(number).is_some() {
                cov.csrs.insert(number, summary);
            } else {
                warn!("undefined CSR with number {number}");
            }
        }

        for size in [1u8, 2, 4] {
            let Some(accesses) = trace.memory_accesses(size) else {
                continue;
            };
            for (&address, summary) in accesses {
                cov.match_memory_access(arch, address, size, *summary);
            }
        }
        cov.memory_regions.retain(|_, s| s.is_accessed());
        cov.device_csrs.retain(|_, s| s.is_accessed());

        for (&id, &executions) in trace.executions() {
            cov.instructions.insert(
                id,
                InstructionCoverage {
                    executions,
                    instances: trace.instances().get(&id).copied().unwrap_or(0),
                },
            );
        }
        cov
    }

    fn match_memory_access(
        &mut self,
        arch: &ArchitectureModel,
        address: u64,
        size: u8,
        summary: AccessSummary,
    ) {
        let last = address.saturating_add(u64::from(size) - 1);
        let slot = if let Some(region) = arch.region_containing(address, last) {
            self.memory_regions.entry(region.name.clone()).or_default()
        } else if let Some((_, csr)) = arch.device_csr_at(address) {
            self.device_csrs
                .entry(format!("{}.{}", csr.device, csr.name))
                .or_default()
        } else {
            warn!(
                "unmatched memory access at 0x{address:x} ({} reads, {} writes)",
                summary.reads, summary.writes
            );
            self.unmatched_accesses += 1;
            return;
        };
        slot.reads += summary.reads;
        slot.writes += summary.writes;
        slot.total += summary.total;
    }

    /// Sum of all GPR accesses
    #[must_use]
    pub fn gpr_totals(&self) -> AccessSummary {
        sum(self.gprs.values())
    }

    /// Sum of all CSR accesses
    #[must_use]
    pub fn csr_totals(&self) -> AccessSummary {
        sum(self.csrs.values())
    }

    /// Total dynamic instruction count
    #[must_use]
    pub fn total_executions(&self) -> u64 {
        self.instructions.values().map(|i| i.executions).sum()
    }

    /// Total static instruction count of executed instructions
    #[must_use]
    pub fn total_instances(&self) -> u64 {
        self.instructions.values().map(|i| i.instances).sum()
    }
}

fn sum<'a>(items: impl Iterator<Item = &'a AccessSummary>) -> AccessSummary {
    items.fold(AccessSummary::default(), |acc, s| AccessSummary {
        reads: acc.reads + s.reads,
        writes: acc.writes + s.writes,
        total: acc.total + s.total,
    })
}

/// Executed versus available instructions over several programs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstructionSummary {
    /// Every instruction of the catalog (optionally one subset)
    pub all: BTreeSet<String>,
    /// Instructions executed by at least one program
    pub covered: BTreeSet<String>,
    /// `all - covered`
    pub missing: BTreeSet<String>,
}

impl InstructionSummary {
    /// Summarise `coverage` over the catalog, optionally for one ISA subset
    #[must_use]
    pub fn build<'a>(
        arch: &ArchitectureModel,
        coverage: impl IntoIterator<Item = &'a HardwareCoverage>,
        subset: Option<&str>,
    ) -> Self {
        let in_subset = |id: InstructionId| {
            arch.instruction(id)
                .filter(|d| subset.map_or(true, |s| d.subset == s))
                .map(|d| d.name.clone())
        };
        let all: BTreeSet<String> = arch
            .instructions()
            .iter()
            .filter_map(|d| in_subset(d.id))
            .collect();
        let covered: BTreeSet<String> = coverage
            .into_iter()
            .flat_map(|c| c.instructions.keys().copied())
            .filter_map(in_subset)
            .collect();
        let missing = all.difference(&covered).cloned().collect();
        Self {
            all,
            covered,
            missing,
        }
    }

    /// Covered percentage, `None` when the catalog has no instruction
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        if self.all.is_empty() {
            None
        } else {
            Some(100.0 * self.covered.len() as f64 / self.all.len() as f64)
        }
    }
}
