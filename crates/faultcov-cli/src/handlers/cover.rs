//! Cover command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{heading, print_json, ProgressReporter};
use crate::{CoverArgs, FormatArg};
use faultcov::{CoverageSetSolver, TestProgram, WeightMetric};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryFile {
    One(TestProgram),
    Many(Vec<TestProgram>),
}

/// Read campaign summaries; each file holds one program or a list
pub fn load_programs(paths: &[PathBuf]) -> CliResult<Vec<TestProgram>> {
    let mut programs = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::invalid_argument(format!("cannot read {}: {e}", path.display()))
        })?;
        let parsed: SummaryFile = serde_json::from_str(&text).map_err(|e| {
            CliError::invalid_argument(format!("{} is not a campaign summary: {e}", path.display()))
        })?;
        let before = programs.len();
        match parsed {
            SummaryFile::One(p) => programs.push(p),
            SummaryFile::Many(ps) => programs.extend(ps),
        }
        debug!(path = %path.display(), programs = programs.len() - before, "loaded summary");
    }
    Ok(programs)
}

/// Selected regression suite
#[derive(Debug, Clone, Serialize)]
pub struct CoverReport {
    /// Weight metric, `None` for the greedy cover
    pub metric: Option<WeightMetric>,
    /// Selected program names in selection order
    pub selected: Vec<String>,
    /// Summed weight of the selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Programs considered
    pub candidates: usize,
    /// Distinct faults detected by any candidate
    pub faults: usize,
}

/// Solve the cover over `programs`
#[must_use]
pub fn select(programs: &[TestProgram], metric: Option<WeightMetric>) -> CoverReport {
    let solver = CoverageSetSolver::new(programs);
    let (chosen, cost) = match metric {
        None => (solver.unweighted(), None),
        Some(metric) => {
            let (chosen, cost) = solver.weighted(metric);
            (chosen, Some(cost))
        }
    };
    CoverReport {
        metric,
        selected: chosen.into_iter().map(|p| p.name.clone()).collect(),
        cost,
        candidates: programs.len(),
        faults: solver.universe_size(),
    }
}

/// Execute the cover command
pub fn execute_cover(config: &CliConfig, args: &CoverArgs) -> CliResult<()> {
    let reporter = ProgressReporter::from_config(config);
    let programs = load_programs(&args.summaries)?;
    if programs.is_empty() {
        reporter.warning("no test programs in the given summaries");
    }
    let metric = args.weighted.then(|| WeightMetric::from(args.metric));
    let report = select(&programs, metric);

    match args.format {
        FormatArg::Json => print_json(&report),
        FormatArg::Text => {
            print!("{}", render_cover(&report, config.color.should_color()));
            Ok(())
        }
    }
}

/// Text rendering of a cover report
#[must_use]
pub fn render_cover(report: &CoverReport, color: bool) -> String {
    let mut out = String::new();
    let title = match report.metric {
        Some(metric) => format!("Weighted cover ({metric})"),
        None => "Greedy cover".to_string(),
    };
    let _ = writeln!(out, "{}", heading(&title, color));
    let _ = writeln!(
        out,
        "  {} of {} programs cover {} faults",
        report.selected.len(),
        report.candidates,
        report.faults
    );
    if let Some(cost) = report.cost {
        let _ = writeln!(out, "  Cost: {cost}");
    }
    for name in &report.selected {
        let _ = writeln!(out, "  {name}");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use faultcov::{FaultCoverageSet, FaultToken};
    use tempfile::TempDir;

    fn program(name: &str, gprs: &[u64], time_us: u64) -> TestProgram {
        let coverage: FaultCoverageSet = gprs
            .iter()
            .map(|&number| FaultToken::Gpr { number, mask: 1 })
            .collect();
        TestProgram {
            time_us,
            ..TestProgram::new(name, coverage)
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_single_and_list() {
            let dir = TempDir::new().unwrap();
            let one = dir.path().join("one.json");
            let many = dir.path().join("many.json");
            std::fs::write(&one, serde_json::to_string(&program("a", &[1], 5)).unwrap()).unwrap();
            std::fs::write(
                &many,
                serde_json::to_string(&vec![program("b", &[2], 1), program("c", &[3], 1)])
                    .unwrap(),
            )
            .unwrap();
            let programs = load_programs(&[one, many]).unwrap();
            let names: Vec<&str> = programs.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, ["a", "b", "c"]);
        }

        #[test]
        fn test_minimal_summary_fields() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("p.json");
            std::fs::write(&path, r#"{"name":"p","coverage":["g,1,0x00000001"]}"#).unwrap();
            let programs = load_programs(&[path]).unwrap();
            assert_eq!(programs[0].time_us, 0);
            assert_eq!(programs[0].coverage.len(), 1);
        }

        #[test]
        fn test_invalid_summary() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("bad.json");
            std::fs::write(&path, "{\"nope\": 1}").unwrap();
            let err = load_programs(&[path]).unwrap_err();
            assert!(err.to_string().contains("not a campaign summary"));
        }
    }

    mod select_tests {
        use super::*;

        #[test]
        fn test_greedy() {
            let programs = vec![
                program("ab", &[1, 2], 1),
                program("bc", &[2, 3], 1),
                program("cd", &[3, 4], 1),
            ];
            let report = select(&programs, None);
            assert_eq!(report.selected, ["ab", "cd"]);
            assert_eq!(report.faults, 4);
            assert!(report.cost.is_none());
        }

        #[test]
        fn test_weighted_prefers_cheaper() {
            let programs = vec![
                program("slow", &[1, 2], 100),
                program("fast-a", &[1], 1),
                program("fast-b", &[2], 1),
            ];
            let report = select(&programs, Some(WeightMetric::Time));
            assert_eq!(report.selected.len(), 2);
            assert_eq!(report.cost, Some(2.0));
            assert!(render_cover(&report, false).contains("Weighted cover (time)"));
        }
    }
}
