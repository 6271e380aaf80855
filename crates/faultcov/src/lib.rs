//! Faultcov: fault-space enumeration and regression-suite selection for
//! processor fault-injection campaigns.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Golden-run   │   │ Mutant       │   │ External     │   │ Set cover    │
//! │ trace        │──►│ generation   │──►│ simulator    │──►│ over killed  │
//! │ (decode)     │   │ (fault space)│   │ (verdicts)   │   │ faults       │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Everything hangs off an immutable [`ArchitectureModel`] loaded from a YAML
//! catalog. A [`TraceDecoder`] turns a golden-run trace into access
//! summaries, a [`MutantGenerator`] expands them over the architecture's
//! [`FaultSpace`] into a [`MutantCampaign`], the simulator attaches verdicts,
//! and the killed mutants of each program become a [`FaultCoverageSet`] for
//! the [`CoverageSetSolver`].

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod catalog;
pub mod coverage;
pub mod fault_edges;
pub mod fault_space;
pub mod mutant;
mod result;
pub mod set_cover;
#[cfg(feature = "simulator")]
pub mod simulator;
pub mod trace;

pub use catalog::{
    parse_number, ArchitectureModel, CsrAccess, CsrDef, DecodeOverlap, DeviceCsr, FaultLimits,
    InstructionDef, InstructionId, MemoryRegion, MemoryType, OperandDef, OperandType,
    RegisterDef,
};
pub use coverage::{FaultCoverageSet, HardwareCoverage, InstructionCoverage, InstructionSummary};
pub use fault_edges::{
    DistanceStatistics, EdgeSummary, FaultEdgeTable, InstructionFaultEdge, OpcodeEffect,
};
pub use fault_space::{
    binomial, enumerate, enumeration_size, restrict_to_mask, FaultOverride,
    FaultRestrictionSource, FaultSpace, FaultToken, FaultUniverse, NaiveEnumeration,
    StructureKind, UncoveredFaults, DEFAULT_REGION_CEILING,
};
pub use mutant::{
    is_killed, parse_results, write_mutant_list, CampaignOptions, Category, GenerationReport,
    Mutant, MutantCampaign, MutantGenerator, MutantKind, MutantRecord, MutantSink, Permanence,
    SimulationResults, NOT_KILLED, TIMEOUT,
};
pub use result::{FaultcovError, FaultcovResult};
pub use set_cover::{
    greedy_cover, weighted_cover, CoverSelection, CoverageSetSolver, TestProgram, WeightMetric,
};
#[cfg(feature = "simulator")]
pub use simulator::{SimulatorConfig, SimulatorRunner};
pub use trace::{AccessSummary, DecodedTrace, TraceDecoder};
