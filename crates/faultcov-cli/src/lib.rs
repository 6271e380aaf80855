//! Faultcov CLI library
//!
//! Command-line front end of the faultcov fault-injection toolkit.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    CampaignArgs, Cli, ColorArg, Commands, CoverArgs, DecodeArgs, FaultsArgs, FormatArg,
    MetricArg, MutantsArgs, SimulateArgs, ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, FaultcovConfig, Verbosity, PROJECT_FILE};
pub use error::{CliError, CliResult};
pub use output::{heading, init_logging, print_json, ratio_label, ProgressReporter};
