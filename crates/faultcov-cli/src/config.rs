//! CLI configuration

use crate::error::{CliError, CliResult};
use faultcov::{SimulatorConfig, DEFAULT_REGION_CEILING};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Project file picked up from the working directory
pub const PROJECT_FILE: &str = "faultcov.yaml";

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Check if debug mode
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// Default log filter directive
    #[must_use]
    pub const fn log_level(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// Contents of `faultcov.yaml`; every field has a default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultcovConfig {
    /// Simulator invocation
    pub simulator: SimulatorConfig,
    /// Mutants buffered per insertion batch
    pub batch_size: usize,
    /// Memory regions above this many bytes are left out of the universe
    pub region_ceiling: u64,
}

impl Default for FaultcovConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            batch_size: faultcov::mutant::DEFAULT_BATCH_SIZE,
            region_ceiling: DEFAULT_REGION_CEILING,
        }
    }
}

impl FaultcovConfig {
    /// Load a project file
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_yaml_ng::from_str(&text)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
    }

    /// Explicit file if given, else `faultcov.yaml` in the working
    /// directory if present, else defaults
    pub fn discover(explicit: Option<&Path>) -> CliResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(PROJECT_FILE).is_file() => Self::load(Path::new(PROJECT_FILE)),
            None => Ok(Self::default()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Project settings
    pub project: FaultcovConfig,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set project settings
    #[must_use]
    pub fn with_project(mut self, project: FaultcovConfig) -> Self {
        self.project = project;
        self
    }
}
