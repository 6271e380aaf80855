//! Output formatting, progress reporting and log setup

use crate::config::{CliConfig, Verbosity};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber; `RUST_LOG` overrides the verbosity
pub fn init_logging(verbosity: Verbosity, color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_level()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(verbosity.is_debug())
        .try_init();
}

/// Progress and status lines on stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Reporter honouring the CLI's color and verbosity
    #[must_use]
    pub fn from_config(config: &CliConfig) -> Self {
        Self::new(config.color.should_color(), config.verbosity.is_quiet())
    }

    /// Start a spinner for a step of unknown length
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        self.progress_bar = Some(pb);
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish and clear the spinner
    pub fn finish(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

/// Pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> crate::CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Coverage ratio as shown in reports: `N/A` without a denominator, `100`
/// when complete, otherwise one decimal with a trailing `.0` dropped
#[must_use]
pub fn ratio_label(ratio: Option<f64>) -> String {
    match ratio {
        None => "N/A".to_string(),
        Some(r) if r >= 100.0 => "100".to_string(),
        Some(r) => {
            let text = format!("{r:.1}");
            text.strip_suffix(".0").unwrap_or(&text).to_string()
        }
    }
}

/// Section heading
#[must_use]
pub fn heading(text: &str, color: bool) -> String {
    if color {
        style(text).bold().underlined().to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod reporter_tests {
        use super::*;

        #[test]
        fn test_quiet_reporter_skips_spinner() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_spinner("simulating");
            assert!(reporter.progress_bar.is_none());
            reporter.finish();
        }

        #[test]
        fn test_spinner_lifecycle() {
            let mut reporter = ProgressReporter::new(false, false);
            reporter.start_spinner("simulating");
            reporter.set_message("still simulating");
            assert!(reporter.progress_bar.is_some());
            reporter.finish();
            assert!(reporter.progress_bar.is_none());
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_ratio_label() {
            assert_eq!(ratio_label(None), "N/A");
            assert_eq!(ratio_label(Some(100.0)), "100");
            assert_eq!(ratio_label(Some(50.0)), "50");
            assert_eq!(ratio_label(Some(100.0 / 3.0)), "33.3");
            assert_eq!(ratio_label(Some(0.0)), "0");
        }

        #[test]
        fn test_plain_heading() {
            assert_eq!(heading("Registers", false), "Registers");
        }
    }
}
