//! External fault-injection simulator invocation.
//!
//! The simulator is an opaque program driven by an argument template. Every
//! attempt runs under a timeout and must exit cleanly; failed attempts are
//! retried until the budget is spent, after which the whole campaign aborts
//! with [`FaultcovError::SimulatorExhausted`].

use crate::mutant::{parse_results, write_mutant_list, MutantCampaign};
use crate::result::{FaultcovError, FaultcovResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default per-attempt timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How to invoke the simulator.
///
/// Argument templates may contain `{binary}`, `{mutants}`, `{report}` and
/// `{trace}`, substituted per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulator executable
    pub program: String,
    /// Arguments for a fault-injection campaign
    pub campaign_args: Vec<String>,
    /// Arguments for a golden-run trace
    pub trace_args: Vec<String>,
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Directory for mutant lists and reports
    pub work_dir: Option<PathBuf>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let base = ["-kernel", "{binary}", "-bios", "none", "-nographic"];
        Self {
            program: "qemu-system-riscv32".to_string(),
            campaign_args: base
                .iter()
                .chain(&["-mutant-list", "{mutants}", "-test-report", "{report}"])
                .map(ToString::to_string)
                .collect(),
            trace_args: base
                .iter()
                .chain(&["-d", "in_asm,goldenrun", "-D", "{trace}"])
                .map(ToString::to_string)
                .collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            work_dir: None,
        }
    }
}

impl SimulatorConfig {
    /// Use `program` with both argument templates
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the campaign argument template
    #[must_use]
    pub fn with_campaign_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.campaign_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the trace argument template
    #[must_use]
    pub fn with_trace_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the attempt budget (at least one)
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Paths substituted into an argument template
#[derive(Debug, Clone, Default)]
struct Placeholders<'a> {
    binary: Option<&'a Path>,
    mutants: Option<&'a Path>,
    report: Option<&'a Path>,
    trace: Option<&'a Path>,
}

impl Placeholders<'_> {
    fn expand(&self, template: &[String]) -> Vec<String> {
        let show = |p: Option<&Path>| p.map(|p| p.display().to_string()).unwrap_or_default();
        template
            .iter()
            .map(|arg| {
                arg.replace("{binary}", &show(self.binary))
                    .replace("{mutants}", &show(self.mutants))
                    .replace("{report}", &show(self.report))
                    .replace("{trace}", &show(self.trace))
            })
            .collect()
    }
}

/// Drives the simulator for campaigns and golden runs
#[derive(Debug, Clone, Default)]
pub struct SimulatorRunner {
    config: SimulatorConfig,
}

impl SimulatorRunner {
    /// Runner with `config`
    #[must_use]
    pub const fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// Runner configuration
    #[must_use]
    pub const fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Simulate every mutant of `campaign` against `binary` and attach the
    /// verdicts; returns the results artifact text.
    ///
    /// A report that leaves any mutant without a verdict is a failed attempt
    /// and is retried. Verdicts are attached only from a complete report, so
    /// an exhausted budget leaves `campaign` unchanged.
    pub async fn run_campaign(
        &self,
        campaign: &mut MutantCampaign,
        binary: &Path,
    ) -> FaultcovResult<String> {
        let dir = self.config.work_dir();
        let stem = sanitize(campaign.name());
        let mutants = dir.join(format!("{stem}.mutants"));
        let report = dir.join(format!("{stem}.testreport"));

        let mut buf = Vec::new();
        write_mutant_list(campaign, &mut buf)?;
        tokio::fs::write(&mutants, &buf).await?;

        let args = Placeholders {
            binary: Some(binary),
            mutants: Some(&mutants),
            report: Some(&report),
            trace: None,
        }
        .expand(&self.config.campaign_args);

        let outcome = self
            .run_with_retries(&args, &report, |text| {
                let results = parse_results(text);
                campaign.check_results(&results)?;
                Ok((text.to_string(), results))
            })
            .await;
        let _ = tokio::fs::remove_file(&mutants).await;
        let _ = tokio::fs::remove_file(&report).await;
        let (text, results) = outcome?;

        let applied = campaign.apply_results(&results);
        info!(
            program = campaign.name(),
            mutants = campaign.len(),
            applied,
            killed = campaign.killed().count(),
            "campaign simulated"
        );
        Ok(text)
    }

    /// Record the golden-run trace of `binary`
    pub async fn generate_trace(&self, binary: &Path) -> FaultcovResult<String> {
        let stem = binary
            .file_stem()
            .map_or_else(|| "program".to_string(), |s| sanitize(&s.to_string_lossy()));
        let trace = self.config.work_dir().join(format!("{stem}.lst"));
        let args = Placeholders {
            binary: Some(binary),
            trace: Some(&trace),
            ..Placeholders::default()
        }
        .expand(&self.config.trace_args);

        let text = self
            .run_with_retries(&args, &trace, |text| Ok(text.to_string()))
            .await?;
        let _ = tokio::fs::remove_file(&trace).await;
        Ok(text)
    }

    /// Run until an attempt exits cleanly and leaves an `output` that
    /// `accept` takes; a rejected output counts as a failed attempt
    async fn run_with_retries<T>(
        &self,
        args: &[String],
        output: &Path,
        accept: impl Fn(&str) -> FaultcovResult<T>,
    ) -> FaultcovResult<T> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.attempt(args, output).await.and_then(|text| accept(&text)) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        attempt,
                        attempts,
                        program = %self.config.program,
                        "simulator attempt failed: {e}"
                    );
                    last_error = e.to_string();
                }
            }
        }
        Err(FaultcovError::SimulatorExhausted {
            attempts,
            last_error,
        })
    }

    async fn attempt(&self, args: &[String], output: &Path) -> FaultcovResult<String> {
        let _ = tokio::fs::remove_file(output).await;
        debug!(program = %self.config.program, ?args, "spawning simulator");

        let mut child = Command::new(&self.config.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                FaultcovError::simulator_attempt(format!(
                    "cannot start {}: {e}",
                    self.config.program
                ))
            })?;

        let limit = Duration::from_secs(self.config.timeout_secs);
        let status = match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(FaultcovError::Timeout {
                    secs: self.config.timeout_secs,
                });
            }
        };
        if !status.success() {
            return Err(FaultcovError::simulator_attempt(format!(
                "{} exited with {status}",
                self.config.program
            )));
        }
        tokio::fs::read_to_string(output).await.map_err(|e| {
            FaultcovError::simulator_attempt(format!("no output at {}: {e}", output.display()))
        })
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
