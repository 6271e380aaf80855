//! Validate command handler

use super::load_architecture;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use crate::ValidateArgs;
use faultcov::{ArchitectureModel, DecodeOverlap, FaultOverride};
use std::fmt::Write as _;

/// Catalog inventory line
#[must_use]
pub fn describe(arch: &ArchitectureModel) -> String {
    format!(
        "{}: {} instructions, {} GPRs, {} FPRs, {} CSRs, {} memory regions, {} device CSRs",
        arch.name(),
        arch.instructions().len(),
        arch.gprs().len(),
        arch.fprs().len(),
        arch.csrs().len(),
        arch.memory_regions().len(),
        arch.device_csrs().len()
    )
}

/// One line per overlapping decode-table pair
#[must_use]
pub fn render_overlaps(arch: &ArchitectureModel, overlaps: &[DecodeOverlap]) -> String {
    let name = |id| arch.instruction(id).map_or("?", |d| d.name.as_str());
    let mut out = String::new();
    for o in overlaps {
        let _ = writeln!(
            out,
            "  {} shadows {} (e.g. 0x{:08x})",
            name(o.first),
            name(o.second),
            o.witness
        );
    }
    out
}

/// Execute the validate command
pub fn execute_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let reporter = ProgressReporter::from_config(config);
    let arch = load_architecture(&args.arch)?;
    reporter.info(&describe(&arch));

    if let Some(path) = arch.fault_override_path() {
        let source = FaultOverride::load(path, arch.limits())?;
        reporter.info(&format!(
            "fault override {}: {} registers",
            path.display(),
            source.len()
        ));
    }

    let overlaps = arch.decode_overlaps();
    if overlaps.is_empty() {
        reporter.success(&format!("{} decode table is unambiguous", arch.name()));
        return Ok(());
    }
    if args.allow_overlaps {
        reporter.warning(&format!("{} overlapping decode entries", overlaps.len()));
        eprint!("{}", render_overlaps(&arch, &overlaps));
        return Ok(());
    }
    reporter.failure(&format!("{} overlapping decode entries", overlaps.len()));
    eprint!("{}", render_overlaps(&arch, &overlaps));
    arch.validate_unambiguous()?;
    Ok(())
}
