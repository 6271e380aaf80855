//! Faults command handler

use super::{load_architecture, load_programs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{heading, print_json, ProgressReporter};
use crate::{FaultsArgs, FormatArg};
use faultcov::{
    ArchitectureModel, DistanceStatistics, EdgeSummary, FaultEdgeTable, FaultSpace,
    FaultUniverse, UncoveredFaults,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;

/// Number of legal faults per structure kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpaceCounts {
    /// GPR faults summed over registers
    pub gpr: u64,
    /// CSR faults summed over registers
    pub csr: u64,
    /// Device CSR faults summed over registers
    pub device_csr: u64,
    /// Instruction-memory faults summed over instructions
    pub instruction: u64,
    /// Fetch-register faults
    pub ifr: u64,
    /// Faults of one core-memory byte
    pub coremem_per_byte: u64,
}

impl SpaceCounts {
    /// Count the masks of `space`
    #[must_use]
    pub fn of(space: &FaultSpace) -> Self {
        Self {
            gpr: space.gprs().map(|(_, m)| m.len() as u64).sum(),
            csr: space.csrs().map(|(_, m)| m.len() as u64).sum(),
            device_csr: space.device_csrs().map(|(_, m)| m.len() as u64).sum(),
            instruction: space.instructions().map(|(_, m)| m.len() as u64).sum(),
            ifr: space.ifr_masks().len() as u64,
            coremem_per_byte: space.coremem_masks().len() as u64,
        }
    }
}

/// Fault-edge statistics at one distance
#[derive(Debug, Clone, Serialize)]
pub struct EdgeReport {
    /// Number of flipped bits
    pub distance: u32,
    /// Architecture-wide totals
    pub summary: EdgeSummary,
    /// Per-instruction counts, keyed by mnemonic
    pub instructions: BTreeMap<String, DistanceStatistics>,
}

impl EdgeReport {
    /// Build the edge table of `arch` and summarise it at `distance`
    #[must_use]
    pub fn build(arch: &ArchitectureModel, space: &FaultSpace, distance: u32) -> Self {
        let table = FaultEdgeTable::build(arch, space);
        let instructions = arch
            .instructions()
            .iter()
            .filter_map(|def| {
                table
                    .statistics(def)
                    .remove(&distance)
                    .map(|stats| (def.name.clone(), stats))
            })
            .collect();
        Self {
            distance,
            summary: table.summary(arch, distance),
            instructions,
        }
    }
}

/// Output of the faults command
#[derive(Debug, Clone, Serialize)]
pub struct FaultsReport {
    /// Architecture name
    pub architecture: String,
    /// Legal faults per structure kind
    pub space: SpaceCounts,
    /// Size of the fault universe
    pub universe: u64,
    /// Edge statistics when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<EdgeReport>,
    /// Faults no given campaign detects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncovered: Option<UncoveredFaults>,
}

/// Execute the faults command
pub fn execute_faults(config: &CliConfig, args: &FaultsArgs) -> CliResult<()> {
    let reporter = ProgressReporter::from_config(config);
    let arch = load_architecture(&args.arch)?;
    let space = FaultSpace::for_architecture(&arch)?;
    let universe = FaultUniverse::build(&arch, &space, config.project.region_ceiling);

    if let Some(path) = &args.tokens {
        let file = std::fs::File::create(path)?;
        let mut out = std::io::BufWriter::new(file);
        for token in universe.explicit_tokens() {
            writeln!(out, "{token}")?;
        }
        out.flush()?;
        reporter.success(&format!(
            "{} tokens written to {}",
            universe.explicit_tokens().len(),
            path.display()
        ));
    }

    let uncovered = if args.uncovered.is_empty() {
        None
    } else {
        let programs = load_programs(&args.uncovered)?;
        if programs.is_empty() {
            return Err(CliError::invalid_argument("no campaign summaries loaded"));
        }
        Some(universe.uncovered(programs.iter().map(|p| p.coverage.as_set())))
    };

    let report = FaultsReport {
        architecture: arch.name().to_string(),
        space: SpaceCounts::of(&space),
        universe: universe.len(),
        edges: args.edges.map(|d| EdgeReport::build(&arch, &space, d)),
        uncovered,
    };

    match args.format {
        FormatArg::Json => print_json(&report),
        FormatArg::Text => {
            print!("{}", render_faults(&report, config.color.should_color()));
            Ok(())
        }
    }
}

/// Text rendering of a faults report
#[must_use]
pub fn render_faults(report: &FaultsReport, color: bool) -> String {
    let mut out = String::new();
    let s = &report.space;
    let _ = writeln!(out, "{}", heading(&format!("Fault space of {}", report.architecture), color));
    let _ = writeln!(out, "  GPR:         {}", s.gpr);
    let _ = writeln!(out, "  CSR:         {}", s.csr);
    let _ = writeln!(out, "  Device CSR:  {}", s.device_csr);
    let _ = writeln!(out, "  Instruction: {}", s.instruction);
    let _ = writeln!(out, "  IFR:         {}", s.ifr);
    let _ = writeln!(out, "  Core memory: {} per byte", s.coremem_per_byte);
    let _ = writeln!(out, "  Universe:    {}", report.universe);

    if let Some(edges) = &report.edges {
        let e = &edges.summary;
        let _ = writeln!(
            out,
            "\n{}",
            heading(&format!("Fault edges at distance {}", edges.distance), color)
        );
        let _ = writeln!(
            out,
            "  all {}  no-effect {}  illegal {}  relevant {}",
            e.all, e.no_effect, e.illegal, e.relevant
        );
        for (name, st) in &edges.instructions {
            let _ = writeln!(
                out,
                "  {name:<10} total {:>6}  don't-care {:>5}  illegal {:>5}  opcode {:>5}  param {:>5}  both {:>5}",
                st.total, st.dont_care, st.illegal, st.opcode_only, st.parameter_only, st.both
            );
        }
    }

    if let Some(u) = &report.uncovered {
        let _ = writeln!(out, "\n{}", heading("Uncovered", color));
        let _ = writeln!(out, "  Faults: {} of {}", u.len(), report.universe);
        let join = |set: &std::collections::BTreeSet<u64>| {
            set.iter().map(u64::to_string).collect::<Vec<_>>().join(" ")
        };
        if !u.gprs.is_empty() {
            let _ = writeln!(out, "  GPRs: {}", join(&u.gprs));
        }
        if !u.csrs.is_empty() {
            let _ = writeln!(out, "  CSRs: {}", join(&u.csrs));
        }
        if !u.instructions.is_empty() {
            let _ = writeln!(out, "  Instructions: {} affected", u.instructions.len());
        }
    }
    out
}
