//! Mutants command handler

use super::{load_architecture, load_trace, program_name};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use crate::MutantsArgs;
use faultcov::{
    write_mutant_list, ArchitectureModel, CampaignOptions, DecodedTrace, FaultEdgeTable,
    FaultSpace, MutantCampaign, MutantGenerator, MutantKind,
};
use std::fmt::Write as _;

/// Generate the campaign of one decoded trace
#[must_use]
pub fn build_campaign(
    arch: &ArchitectureModel,
    space: &FaultSpace,
    trace: &DecodedTrace,
    name: &str,
    options: CampaignOptions,
    batch_size: usize,
) -> MutantCampaign {
    let edges = FaultEdgeTable::build(arch, space);
    MutantGenerator::new(arch, space, &edges)
        .with_batch_size(batch_size)
        .generate_campaign(name, trace, options)
}

/// One line per mutant kind: `code count`
#[must_use]
pub fn render_kind_counts(campaign: &MutantCampaign) -> String {
    let mut out = String::new();
    for (code, count) in campaign.count_by_kind() {
        let label = MutantKind::from_code(code).map_or_else(
            || code.to_string(),
            |k| format!("{:?}/{:?}", k.category(), k.permanence()),
        );
        let _ = writeln!(out, "  {code:>3} {label:<40} {count}");
    }
    out
}

/// Execute the mutants command
pub fn execute_mutants(config: &CliConfig, args: &MutantsArgs) -> CliResult<()> {
    let reporter = ProgressReporter::from_config(config);
    let arch = load_architecture(&args.arch)?;
    let trace = load_trace(&arch, &args.trace)?;
    let space = FaultSpace::for_architecture(&arch)?;
    let batch_size = args.batch_size.unwrap_or(config.project.batch_size);
    let campaign = build_campaign(
        &arch,
        &space,
        &trace,
        &program_name(&args.trace),
        args.campaign.into(),
        batch_size,
    );

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_mutant_list(&campaign, std::io::BufWriter::new(file))?;
            reporter.success(&format!(
                "{} mutants written to {} (skipped: {})",
                campaign.len(),
                path.display(),
                campaign.skipped()
            ));
            if config.verbosity.is_verbose() {
                eprint!("{}", render_kind_counts(&campaign));
            }
        }
        None => write_mutant_list(&campaign, std::io::stdout().lock())?,
    }
    Ok(())
}
