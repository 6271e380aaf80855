//! faultcov: fault-injection campaigns from the command line
//!
//! ## Usage
//!
//! ```bash
//! faultcov validate rv32.yaml                        # Check a catalog
//! faultcov decode -a rv32.yaml prog.lst              # Hardware coverage of a trace
//! faultcov mutants -a rv32.yaml prog.lst -o prog.mutants
//! faultcov simulate -a rv32.yaml prog.elf            # Trace, mutate, simulate
//! faultcov cover -w -m time *.json                   # Minimal regression suite
//! ```

use clap::Parser;
use faultcov_cli::{
    handlers, init_logging, Cli, CliConfig, CliResult, ColorChoice, Commands, FaultcovConfig,
    Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_logging(config.verbosity, config.color.should_color());

    match cli.command {
        Commands::Decode(args) => handlers::execute_decode(&config, &args),
        Commands::Faults(args) => handlers::execute_faults(&config, &args),
        Commands::Mutants(args) => handlers::execute_mutants(&config, &args),
        Commands::Simulate(args) => handlers::execute_simulate(&config, &args),
        Commands::Cover(args) => handlers::execute_cover(&config, &args),
        Commands::Validate(args) => handlers::execute_validate(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();
    let project = FaultcovConfig::discover(cli.config.as_deref())?;

    Ok(CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_project(project))
}
