//! Mutant-list and results artifacts exchanged with the simulator.

use super::MutantCampaign;
use crate::result::FaultcovResult;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::LazyLock;
use tracing::warn;

/// Detection label of an undetected mutant
pub const NOT_KILLED: &str = "not killed";

/// Detection label of a mutant that exceeded the simulation budget
pub const TIMEOUT: &str = "timeout";

#[allow(clippy::expect_used)]
static RE_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<id>\d+),\s*(?P<result>[\w\-_: ]+),\s*(?P<duration>\d+) us")
        .expect("result pattern is a literal")
});

#[allow(clippy::expect_used)]
static RE_GOLDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s+Golden run took\s+(?P<time>\d+) us to complete")
        .expect("golden pattern is a literal")
});

/// Verdict of one mutant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOutcome {
    /// Detection label
    pub result: String,
    /// Simulated run time in microseconds
    pub duration_us: u64,
}

/// Parsed results artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationResults {
    /// Golden-run duration in microseconds
    pub golden_time_us: Option<u64>,
    /// Verdicts by mutant id
    pub outcomes: BTreeMap<u64, SimulationOutcome>,
}

/// Write the mutant list consumed by the simulator.
///
/// ```text
/// #id,kind,address/regnum,nracc,biterror
/// 1,1,5,0,0x00000001
/// # Done: created 1 mutants (skipped: 0).
/// ```
pub fn write_mutant_list<W: Write>(campaign: &MutantCampaign, mut out: W) -> FaultcovResult<()> {
    writeln!(out, "#id,kind,address/regnum,nracc,biterror")?;
    for m in campaign.mutants() {
        writeln!(
            out,
            "{},{},{},{},0x{:08X}",
            m.id,
            m.kind.code(),
            m.target,
            m.access_index,
            m.mask
        )?;
    }
    writeln!(
        out,
        "# Done: created {} mutants (skipped: {}).",
        campaign.len(),
        campaign.skipped()
    )?;
    out.flush()?;
    Ok(())
}

/// Golden-run duration from a results artifact
#[must_use]
pub fn parse_golden_time(text: &str) -> Option<u64> {
    text.lines().find_map(|line| {
        RE_GOLDEN
            .captures(line)
            .and_then(|c| c.name("time")?.as_str().parse().ok())
    })
}

/// Parse a results artifact; a repeated id keeps its last verdict
#[must_use]
pub fn parse_results(text: &str) -> SimulationResults {
    let mut outcomes = BTreeMap::new();
    for line in text.lines() {
        let Some(c) = RE_RESULT.captures(line) else {
            continue;
        };
        let (Some(id), Some(result), Some(duration)) = (
            c.name("id").and_then(|m| m.as_str().parse::<u64>().ok()),
            c.name("result").map(|m| m.as_str().trim().to_owned()),
            c.name("duration").and_then(|m| m.as_str().parse::<u64>().ok()),
        ) else {
            continue;
        };
        if outcomes
            .insert(
                id,
                SimulationOutcome {
                    result,
                    duration_us: duration,
                },
            )
            .is_some()
        {
            warn!(id, "mutant reported twice, keeping the last result");
        }
    }
    SimulationResults {
        golden_time_us: parse_golden_time(text),
        outcomes,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mutant::{CampaignOptions, Category, MutantKind, MutantRecord, MutantSink, Permanence};

    fn campaign() -> MutantCampaign {
        let mut campaign = MutantCampaign::new("prog", CampaignOptions::default());
        campaign.insert_batch(&mut vec![
            MutantRecord {
                kind: MutantKind::new(Category::Gpr, Permanence::TransientFlip).unwrap(),
                target: 5,
                access_index: 3,
                mask: 0x10,
                edge: None,
            },
            MutantRecord {
                kind: MutantKind::new(Category::CoreMemory, Permanence::PermanentStuckAt1).unwrap(),
                target: 0x8000_1000,
                access_index: 0,
                mask: 0x80,
                edge: None,
            },
        ]);
        campaign.add_skipped(2);
        campaign
    }

    mod mutant_list_tests {
        use super::*;

        #[test]
        fn test_write_mutant_list_format() {
            let mut buf = Vec::new();
            write_mutant_list(&campaign(), &mut buf).unwrap();
            let text = String::from_utf8(buf).unwrap();
            let lines: Vec<_> = text.lines().collect();
            assert_eq!(lines[0], "#id,kind,address/regnum,nracc,biterror");
            assert_eq!(lines[1], "1,2,5,3,0x00000010");
            assert_eq!(lines[2], "2,81,2147487744,0,0x00000080");
            assert_eq!(lines[3], "# Done: created 2 mutants (skipped: 2).");
        }

        #[test]
        fn test_results_reference_every_listed_id() {
            let campaign = campaign();
            let report: String = campaign
                .mutants()
                .iter()
                .map(|m| format!("{}, exception, 5 us\n", m.id))
                .collect();
            let results = parse_results(&report);
            let ids: Vec<_> = results.outcomes.keys().copied().collect();
            let expected: Vec<_> = campaign.mutants().iter().map(|m| m.id).collect();
            assert_eq!(ids, expected);
        }
    }

    mod results_tests {
        use super::*;

        #[test]
        fn test_parse_results_lines() {
            let text = "\
# Golden run took 4711 us to complete...
   1, not killed, 20 us
2, illegal-instruction: 2, 33 us
garbage line
3,timeout,9 us
";
            let results = parse_results(text);
            assert_eq!(results.golden_time_us, Some(4711));
            assert_eq!(results.outcomes.len(), 3);
            assert_eq!(results.outcomes[&1].result, NOT_KILLED);
            assert_eq!(results.outcomes[&2].result, "illegal-instruction: 2");
            assert_eq!(results.outcomes[&3].duration_us, 9);
        }

        #[test]
        fn test_duplicate_keeps_last() {
            let results = parse_results("1, exception, 1 us\n1, not killed, 2 us\n");
            assert_eq!(results.outcomes[&1].result, NOT_KILLED);
        }

        #[test]
        fn test_missing_golden_time() {
            assert_eq!(parse_golden_time("1, exception, 1 us\n"), None);
        }
    }
}
