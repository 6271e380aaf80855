//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use faultcov::{CampaignOptions, WeightMetric};
use std::path::PathBuf;

/// faultcov: fault-injection campaigns and regression-suite selection
#[derive(Parser, Debug)]
#[command(name = "faultcov")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Project file (defaults to ./faultcov.yaml when present)
    #[arg(long, global = true, env = "FAULTCOV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a golden-run trace and report hardware coverage
    Decode(DecodeArgs),

    /// Report the fault space of an architecture
    Faults(FaultsArgs),

    /// Generate the mutant list of one test program
    Mutants(MutantsArgs),

    /// Run a fault-injection campaign through the simulator
    Simulate(SimulateArgs),

    /// Select a minimal regression suite by set cover
    Cover(CoverArgs),

    /// Validate an architecture catalog
    Validate(ValidateArgs),
}

/// Arguments for the decode command
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Architecture catalog (YAML)
    #[arg(short, long)]
    pub arch: PathBuf,

    /// Golden-run trace
    pub trace: PathBuf,

    /// Restrict the instruction summary to one ISA subset
    #[arg(long)]
    pub subset: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the faults command
#[derive(Parser, Debug)]
pub struct FaultsArgs {
    /// Architecture catalog (YAML)
    #[arg(short, long)]
    pub arch: PathBuf,

    /// Print fault-edge statistics for this distance
    #[arg(long, value_name = "DISTANCE")]
    pub edges: Option<u32>,

    /// Write the register, instruction and fetch-register universe tokens
    #[arg(long, value_name = "FILE")]
    pub tokens: Option<PathBuf>,

    /// Campaign summaries whose union is subtracted from the universe
    #[arg(long, value_name = "SUMMARY", num_args = 1..)]
    pub uncovered: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Which mutants to generate
#[derive(Args, Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
pub struct CampaignArgs {
    /// Skip GPR faults
    #[arg(long)]
    pub no_gpr: bool,

    /// Skip CSR faults
    #[arg(long)]
    pub no_csr: bool,

    /// Skip instruction-memory faults
    #[arg(long)]
    pub no_imem: bool,

    /// Skip instruction-fetch-register faults
    #[arg(long)]
    pub no_ifr: bool,

    /// Add core-memory faults
    #[arg(long)]
    pub coremem: bool,

    /// Add transient register faults
    #[arg(long)]
    pub transient: bool,

    /// Skip permanent bit flips
    #[arg(long)]
    pub no_flip: bool,

    /// Skip stuck-at faults
    #[arg(long)]
    pub no_stuck_at: bool,
}

impl From<CampaignArgs> for CampaignOptions {
    fn from(args: CampaignArgs) -> Self {
        Self {
            gpr: !args.no_gpr,
            csr: !args.no_csr,
            imem: !args.no_imem,
            ifr: !args.no_ifr,
            coremem: args.coremem,
            transient: args.transient,
            flip: !args.no_flip,
            stuck_at: !args.no_stuck_at,
        }
    }
}

/// Arguments for the mutants command
#[derive(Parser, Debug)]
pub struct MutantsArgs {
    /// Architecture catalog (YAML)
    #[arg(short, long)]
    pub arch: PathBuf,

    /// Golden-run trace
    pub trace: PathBuf,

    /// Mutant list destination (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Mutants buffered per insertion batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Category and permanence toggles
    #[command(flatten)]
    pub campaign: CampaignArgs,
}

/// Arguments for the simulate command
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Architecture catalog (YAML)
    #[arg(short, long)]
    pub arch: PathBuf,

    /// Test program binary
    pub binary: PathBuf,

    /// Existing golden-run trace (recorded through the simulator otherwise)
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Campaign summary destination (`<program>.json` when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep the simulator's results artifact here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Simulator executable
    #[arg(long)]
    pub simulator: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Attempts before giving up
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Category and permanence toggles
    #[command(flatten)]
    pub campaign: CampaignArgs,
}

/// Arguments for the cover command
#[derive(Parser, Debug)]
pub struct CoverArgs {
    /// Campaign summaries (JSON, one program or a list)
    #[arg(required = true)]
    pub summaries: Vec<PathBuf>,

    /// Weighted set cover instead of greedy
    #[arg(short, long)]
    pub weighted: bool,

    /// Weight of each program in weighted mode
    #[arg(short, long, default_value = "time")]
    pub metric: MetricArg,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Architecture catalog (YAML)
    pub arch: PathBuf,

    /// Report overlapping decode entries without failing
    #[arg(long)]
    pub allow_overlaps: bool,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Weight metric argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MetricArg {
    /// Golden-run duration
    #[default]
    Time,
    /// Static instruction count
    Iinst,
    /// Dynamic instruction count
    Iexec,
    /// One per program
    Programs,
}

impl From<MetricArg> for WeightMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Time => Self::Time,
            MetricArg::Iinst => Self::InstructionInstances,
            MetricArg::Iexec => Self::InstructionExecutions,
            MetricArg::Programs => Self::Programs,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
