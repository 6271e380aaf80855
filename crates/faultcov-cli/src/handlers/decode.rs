//! Decode command handler

use super::{load_architecture, load_trace, program_name};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::{heading, print_json, ratio_label};
use crate::{DecodeArgs, FormatArg};
use faultcov::{ArchitectureModel, HardwareCoverage, InstructionSummary};
use serde::Serialize;
use std::fmt::Write as _;

/// Hardware coverage of one program as printed by `decode`
#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    /// Program name
    pub program: String,
    /// Architecture name
    pub architecture: String,
    /// Addresses whose encoding matched no instruction
    pub undecoded: usize,
    /// Structures exercised by the golden run
    pub coverage: HardwareCoverage,
    /// Executed versus available instructions
    pub instructions: InstructionSummary,
}

impl DecodeReport {
    /// Analyse `coverage` for display
    #[must_use]
    pub fn new(
        program: String,
        arch: &ArchitectureModel,
        undecoded: usize,
        coverage: HardwareCoverage,
        subset: Option<&str>,
    ) -> Self {
        let instructions = InstructionSummary::build(arch, [&coverage], subset);
        Self {
            program,
            architecture: arch.name().to_string(),
            undecoded,
            coverage,
            instructions,
        }
    }
}

/// Execute the decode command
pub fn execute_decode(config: &CliConfig, args: &DecodeArgs) -> CliResult<()> {
    let arch = load_architecture(&args.arch)?;
    let trace = load_trace(&arch, &args.trace)?;
    let coverage = HardwareCoverage::analyze(&arch, &trace);
    let report = DecodeReport::new(
        program_name(&args.trace),
        &arch,
        trace.undecoded().len(),
        coverage,
        args.subset.as_deref(),
    );

    match args.format {
        FormatArg::Json => print_json(&report),
        FormatArg::Text => {
            print!("{}", render_decode(&report, config.color.should_color()));
            Ok(())
        }
    }
}

/// Text rendering of a decode report
#[must_use]
pub fn render_decode(report: &DecodeReport, color: bool) -> String {
    let cov = &report.coverage;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}",
        heading(&format!("{} on {}", report.program, report.architecture), color)
    );
    let _ = writeln!(
        out,
        "  Instructions: {} executions, {} instances, {} undecoded",
        cov.total_executions(),
        cov.total_instances(),
        report.undecoded
    );

    let gpr = cov.gpr_totals();
    let _ = writeln!(
        out,
        "  GPRs: {} accessed ({} reads, {} writes)",
        cov.gprs.len(),
        gpr.reads,
        gpr.writes
    );
    let csr = cov.csr_totals();
    let _ = writeln!(
        out,
        "  CSRs: {} accessed ({} reads, {} writes)",
        cov.csrs.len(),
        csr.reads,
        csr.writes
    );
    if !cov.fprs.is_empty() {
        let _ = writeln!(out, "  FPRs: {} referenced", cov.fprs.len());
    }
    if !cov.registers.unknown.is_empty() {
        let names: Vec<&str> = cov.registers.unknown.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  Unknown registers: {}", names.join(", "));
    }

    if !cov.memory_regions.is_empty() || !cov.device_csrs.is_empty() {
        let _ = writeln!(out, "\n{}", heading("Memory", color));
        for (name, s) in cov.memory_regions.iter().chain(&cov.device_csrs) {
            let _ = writeln!(out, "  {name}: {} reads, {} writes", s.reads, s.writes);
        }
    }
    if cov.unmatched_accesses > 0 {
        let _ = writeln!(out, "  Unmatched accesses: {}", cov.unmatched_accesses);
    }

    let summary = &report.instructions;
    let _ = writeln!(out, "\n{}", heading("Instruction coverage", color));
    let _ = writeln!(
        out,
        "  {}/{} ({}%)",
        summary.covered.len(),
        summary.all.len(),
        ratio_label(summary.ratio())
    );
    if !summary.missing.is_empty() {
        let missing: Vec<&str> = summary.missing.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  Missing: {}", missing.join(" "));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::handlers::fixtures;
    use tempfile::TempDir;

    fn report(subset: Option<&str>) -> DecodeReport {
        let dir = TempDir::new().unwrap();
        let (arch, trace) = fixtures::write(dir.path());
        let arch = load_architecture(&arch).unwrap();
        let trace = load_trace(&arch, &trace).unwrap();
        let coverage = HardwareCoverage::analyze(&arch, &trace);
        DecodeReport::new("prog".into(), &arch, trace.undecoded().len(), coverage, subset)
    }

    mod report_tests {
        use super::*;

        #[test]
        fn test_instruction_summary() {
            let report = report(None);
            assert_eq!(report.instructions.all.len(), 3);
            assert_eq!(report.instructions.covered.len(), 2);
            assert!(report.instructions.missing.contains("lw"));
        }

        #[test]
        fn test_subset_filter() {
            let report = report(Some("Zicsr"));
            assert_eq!(report.instructions.all.len(), 1);
            assert_eq!(report.instructions.ratio(), Some(100.0));
        }

        #[test]
        fn test_json_shape() {
            let json = serde_json::to_value(report(None)).unwrap();
            assert_eq!(json["architecture"], "fixture");
            assert_eq!(json["undecoded"], 0);
            assert!(json["coverage"]["memory_regions"]["ram"].is_object());
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_text_rendering() {
            let text = render_decode(&report(None), false);
            assert!(text.starts_with("prog on fixture"));
            assert!(text.contains("4 executions, 2 instances"));
            assert!(text.contains("ram: 1 reads, 1 writes"));
            assert!(text.contains("2/3 (66.7%)"));
            assert!(text.contains("Missing: lw"));
        }
    }
}
