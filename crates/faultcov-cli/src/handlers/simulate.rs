//! Simulate command handler
//!
//! Runs the whole per-program pipeline: golden-run trace (recorded through
//! the simulator unless given), mutant generation, the fault-injection
//! campaign, and finally the JSON summary that `cover` consumes.

use super::mutants::build_campaign;
use super::{load_architecture, load_trace, program_name};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::SimulateArgs;
use faultcov::{
    ArchitectureModel, DecodedTrace, FaultCoverageSet, FaultSpace, FaultUniverse,
    HardwareCoverage, MutantCampaign, SimulatorConfig, SimulatorRunner, TestProgram,
    TraceDecoder,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Project simulator settings with command-line overrides applied
#[must_use]
pub fn simulator_config(config: &CliConfig, args: &SimulateArgs) -> SimulatorConfig {
    let mut sim = config.project.simulator.clone();
    if let Some(program) = &args.simulator {
        sim = sim.with_program(program.clone());
    }
    if let Some(secs) = args.timeout {
        sim = sim.with_timeout_secs(secs);
    }
    if let Some(attempts) = args.attempts {
        sim = sim.with_max_attempts(attempts);
    }
    sim
}

/// Campaign summary of one simulated program
#[must_use]
pub fn summarize(
    arch: &ArchitectureModel,
    trace: &DecodedTrace,
    campaign: &MutantCampaign,
    universe: &FaultUniverse,
) -> TestProgram {
    let hardware = HardwareCoverage::analyze(arch, trace);
    TestProgram {
        time_us: campaign.golden_time_us().unwrap_or(0),
        instruction_instances: hardware.total_instances(),
        instruction_executions: hardware.total_executions(),
        ..TestProgram::new(
            campaign.name(),
            FaultCoverageSet::from_campaign(campaign, universe),
        )
    }
}

/// Execute the simulate command
pub fn execute_simulate(config: &CliConfig, args: &SimulateArgs) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))?;
    rt.block_on(simulate(config, args))
}

async fn simulate(config: &CliConfig, args: &SimulateArgs) -> CliResult<()> {
    let mut reporter = ProgressReporter::from_config(config);
    let arch = load_architecture(&args.arch)?;
    if !args.binary.is_file() {
        return Err(CliError::invalid_argument(format!(
            "binary {} does not exist",
            args.binary.display()
        )));
    }
    let name = program_name(&args.binary);
    let runner = SimulatorRunner::new(simulator_config(config, args));

    let trace = match &args.trace {
        Some(path) => load_trace(&arch, path)?,
        None => {
            reporter.start_spinner(&format!("Recording golden run of {name}"));
            let text = runner.generate_trace(&args.binary).await;
            reporter.finish();
            TraceDecoder::new(&arch).decode(&text?)
        }
    };

    let space = FaultSpace::for_architecture(&arch)?;
    let batch_size = config.project.batch_size;
    let mut campaign =
        build_campaign(&arch, &space, &trace, &name, args.campaign.into(), batch_size);
    info!(
        program = %name,
        mutants = campaign.len(),
        skipped = campaign.skipped(),
        "campaign generated"
    );
    if campaign.is_empty() {
        reporter.warning(&format!("{name}: no mutants generated"));
    }

    reporter.start_spinner(&format!("Simulating {} mutants of {name}", campaign.len()));
    let outcome = runner.run_campaign(&mut campaign, &args.binary).await;
    reporter.finish();
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            reporter.failure(&format!("{name}: campaign aborted"));
            return Err(e.into());
        }
    };
    if let Some(path) = &args.report {
        debug!(path = %path.display(), "keeping simulator report");
        std::fs::write(path, &report)?;
    }

    let universe = FaultUniverse::build(&arch, &space, config.project.region_ceiling);
    let program = summarize(&arch, &trace, &campaign, &universe);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{name}.json")));
    std::fs::write(&output, serde_json::to_string_pretty(&program)?)
        .map_err(|e| CliError::report_generation(format!("{}: {e}", output.display())))?;

    reporter.success(&format!(
        "{name}: {}/{} mutants killed, {} faults covered, summary in {}",
        campaign.killed().count(),
        campaign.len(),
        program.coverage.len(),
        output.display()
    ));
    Ok(())
}
