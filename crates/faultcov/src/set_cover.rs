//! Regression-suite minimisation by set cover.
//!
//! Two solvers over the fault coverage sets of a collection of test
//! programs: a greedy maximum-coverage cover and a cost-effectiveness
//! (Chvátal) weighted cover. Both collapse programs with identical
//! coverage to a single representative before solving.

use crate::coverage::FaultCoverageSet;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// One test program as seen by the solvers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestProgram {
    /// Program name
    pub name: String,
    /// Faults the program detects
    pub coverage: FaultCoverageSet,
    /// Golden-run duration in microseconds
    #[serde(default)]
    pub time_us: u64,
    /// Static instruction count
    #[serde(default)]
    pub instruction_instances: u64,
    /// Dynamic instruction count
    #[serde(default)]
    pub instruction_executions: u64,
}

impl TestProgram {
    /// Program with the given coverage and zero weights
    #[must_use]
    pub fn new(name: impl Into<String>, coverage: FaultCoverageSet) -> Self {
        Self {
            name: name.into(),
            coverage,
            time_us: 0,
            instruction_instances: 0,
            instruction_executions: 0,
        }
    }
}

/// Cost assigned to a program by the weighted solver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMetric {
    /// Golden-run duration
    #[default]
    Time,
    /// Static instruction count
    InstructionInstances,
    /// Dynamic instruction count
    InstructionExecutions,
    /// Every program costs 1
    Programs,
}

impl WeightMetric {
    /// All metrics
    pub const ALL: [Self; 4] = [
        Self::Time,
        Self::InstructionInstances,
        Self::InstructionExecutions,
        Self::Programs,
    ];

    /// Weight of `program` under this metric
    #[must_use]
    pub fn weight(self, program: &TestProgram) -> f64 {
        match self {
            Self::Time => program.time_us as f64,
            Self::InstructionInstances => program.instruction_instances as f64,
            Self::InstructionExecutions => program.instruction_executions as f64,
            Self::Programs => 1.0,
        }
    }
}

impl fmt::Display for WeightMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Time => "time",
            Self::InstructionInstances => "iinst",
            Self::InstructionExecutions => "iexec",
            Self::Programs => "programs",
        };
        f.write_str(name)
    }
}

impl FromStr for WeightMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(Self::Time),
            "iinst" | "instances" | "instruction_instances" => Ok(Self::InstructionInstances),
            "iexec" | "executions" | "instruction_executions" => Ok(Self::InstructionExecutions),
            "programs" | "count" => Ok(Self::Programs),
            other => Err(format!("unknown weight metric '{other}'")),
        }
    }
}

/// Result of a weighted cover
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverSelection {
    /// Indices into the input, in selection order
    pub selected: Vec<usize>,
    /// Summed weight of the selection
    pub cost: f64,
}

/// Greedy maximum-coverage set cover.
///
/// Repeatedly picks the set adding the most uncovered elements until the
/// union of all sets is covered. Identical sets keep their first occurrence
/// and ties go to the earliest set. Returns indices into `sets`.
#[must_use]
pub fn greedy_cover<T: Ord>(sets: &[BTreeSet<T>]) -> Vec<usize> {
    let mut candidates: Vec<usize> = Vec::new();
    for (i, s) in sets.iter().enumerate() {
        if !candidates.iter().any(|&j| sets[j] == *s) {
            candidates.push(i);
        }
    }

    let elements: BTreeSet<&T> = candidates.iter().flat_map(|&i| sets[i].iter()).collect();
    let mut covered: BTreeSet<&T> = BTreeSet::new();
    let mut cover = Vec::new();

    while covered.len() < elements.len() {
        let mut best: Option<(usize, usize)> = None;
        for &i in &candidates {
            let gain = sets[i].iter().filter(|e| !covered.contains(e)).count();
            if best.map_or(true, |(_, b)| gain > b) {
                best = Some((i, gain));
            }
        }
        let Some((i, gain)) = best else { break };
        if gain == 0 {
            break;
        }
        covered.extend(sets[i].iter());
        cover.push(i);
    }
    cover
}

/// Chvátal weighted set cover.
///
/// Each set has priority `weight / |uncovered elements it adds|`, or
/// infinity once it adds nothing; the cheapest set per new element is taken
/// until every element is covered. Among identical sets only the one with
/// the lowest weight (first on ties) takes part. Missing weights count as
/// zero.
#[must_use]
pub fn weighted_cover<T: Ord + Clone>(sets: &[BTreeSet<T>], weights: &[f64]) -> CoverSelection {
    let weight = |i: usize| weights.get(i).copied().unwrap_or(0.0);

    let mut representative: BTreeMap<&BTreeSet<T>, usize> = BTreeMap::new();
    for (i, s) in sets.iter().enumerate() {
        representative
            .entry(s)
            .and_modify(|j| {
                if weight(i) < weight(*j) {
                    *j = i;
                }
            })
            .or_insert(i);
    }
    let mut candidates: Vec<usize> = representative.into_values().collect();
    candidates.sort_unstable();

    let mut remaining: HashMap<usize, BTreeSet<T>> = HashMap::new();
    let mut holders: BTreeMap<T, Vec<usize>> = BTreeMap::new();
    let mut queue = PriorityQueue::default();
    for &i in &candidates {
        for e in &sets[i] {
            holders.entry(e.clone()).or_default().push(i);
        }
        remaining.insert(i, sets[i].clone());
        queue.insert(i, priority(weight(i), sets[i].len()));
    }

    let universe = holders.len();
    let mut covered = 0usize;
    let mut selection = CoverSelection {
        selected: Vec::new(),
        cost: 0.0,
    };

    while covered < universe {
        let Some((a, p)) = queue.pop() else { break };
        if p.is_infinite() {
            break;
        }
        let gained = remaining.remove(&a).unwrap_or_default();
        covered += gained.len();
        selection.selected.push(a);
        selection.cost += weight(a);

        let mut touched = BTreeSet::new();
        for e in &gained {
            for &j in holders.get(e).map_or(&[][..], Vec::as_slice) {
                if j != a {
                    if let Some(r) = remaining.get_mut(&j) {
                        r.remove(e);
                        touched.insert(j);
                    }
                }
            }
        }
        for j in touched {
            let len = remaining.get(&j).map_or(0, BTreeSet::len);
            queue.insert(j, priority(weight(j), len));
        }
    }
    debug!(
        selected = selection.selected.len(),
        cost = selection.cost,
        universe,
        "weighted set cover"
    );
    selection
}

fn priority(weight: f64, uncovered: usize) -> f64 {
    if uncovered == 0 {
        f64::INFINITY
    } else {
        weight / uncovered as f64
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    priority: f64,
    seq: u64,
    item: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap with insert-or-update; superseded entries stay in the heap and
/// are skipped when popped.
#[derive(Debug, Default)]
struct PriorityQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    live: HashMap<usize, u64>,
    counter: u64,
}

impl PriorityQueue {
    fn insert(&mut self, item: usize, priority: f64) {
        let seq = self.counter;
        self.counter += 1;
        self.live.insert(item, seq);
        self.heap.push(Reverse(Entry {
            priority,
            seq,
            item,
        }));
    }

    fn pop(&mut self) -> Option<(usize, f64)> {
        while let Some(Reverse(entry)) = self.heap.pop() {
            if self.live.get(&entry.item) == Some(&entry.seq) {
                self.live.remove(&entry.item);
                return Some((entry.item, entry.priority));
            }
        }
        None
    }
}

/// Set-cover solver over test programs
#[derive(Debug, Clone, Copy)]
pub struct CoverageSetSolver<'a> {
    programs: &'a [TestProgram],
}

impl<'a> CoverageSetSolver<'a> {
    /// Solver over `programs`
    #[must_use]
    pub const fn new(programs: &'a [TestProgram]) -> Self {
        Self { programs }
    }

    fn sets(&self) -> Vec<BTreeSet<crate::fault_space::FaultToken>> {
        self.programs
            .iter()
            .map(|p| p.coverage.as_set().clone())
            .collect()
    }

    /// Programs selected by the greedy cover, in selection order
    #[must_use]
    pub fn unweighted(&self) -> Vec<&'a TestProgram> {
        greedy_cover(&self.sets())
            .into_iter()
            .map(|i| &self.programs[i])
            .collect()
    }

    /// Programs selected by the weighted cover, and their summed weight
    #[must_use]
    pub fn weighted(&self, metric: WeightMetric) -> (Vec<&'a TestProgram>, f64) {
        let weights: Vec<f64> = self.programs.iter().map(|p| metric.weight(p)).collect();
        let selection = weighted_cover(&self.sets(), &weights);
        let programs = selection
            .selected
            .into_iter()
            .map(|i| &self.programs[i])
            .collect();
        (programs, selection.cost)
    }

    /// Union of every program's coverage
    #[must_use]
    pub fn universe_size(&self) -> usize {
        self.programs
            .iter()
            .flat_map(|p| p.coverage.iter())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
