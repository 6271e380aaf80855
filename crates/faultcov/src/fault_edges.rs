//! Static effect of instruction-encoding bit faults on decoding.
//!
//! For every instruction `s` and every legal instruction-memory mask `e`,
//! `s.opcode ^ e` is decoded again. The resulting [`InstructionFaultEdge`]
//! records the target instruction (if any), how the opcode changed and which
//! operand kinds were touched. The table is built once per architecture and
//! consulted read-only during mutant generation.

use crate::catalog::{ArchitectureModel, InstructionDef, InstructionId, OperandType};
use crate::fault_space::{binomial, FaultSpace};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Effect of a fault on the decoded opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpcodeEffect {
    /// Still decodes to the same instruction
    None,
    /// Decodes to another instruction
    OpcodeChange,
    /// Source or target is a branch or jump
    ControlFlowChange,
    /// Decodes to nothing
    Illegal,
}

/// Effect of flipping `mask` in the encoding of `source`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InstructionFaultEdge {
    /// Faulted instruction
    pub source: InstructionId,
    /// Flipped bits
    pub mask: u64,
    /// Number of flipped bits
    pub distance: u32,
    /// Instruction decoded after the flip
    pub target: Option<InstructionId>,
    /// Opcode classification
    pub opcode: OpcodeEffect,
    /// A GPR operand field is touched
    pub gpr: bool,
    /// An FPR operand field is touched
    pub fpr: bool,
    /// A CSR operand field is touched
    pub csr: bool,
    /// An immediate field is touched
    pub imm: bool,
}

impl InstructionFaultEdge {
    /// Classify `mask` applied to `source`
    #[must_use]
    pub fn classify(arch: &ArchitectureModel, source: &InstructionDef, mask: u64) -> Self {
        let target = arch.decode_width(source.opcode ^ mask, source.bits);
        let opcode = match target {
            None => OpcodeEffect::Illegal,
            Some(t) if t.id == source.id => OpcodeEffect::None,
            Some(t) if t.is_control_flow() || source.is_control_flow() => {
                OpcodeEffect::ControlFlowChange
            }
            Some(_) => OpcodeEffect::OpcodeChange,
        };
        let touches = |pred: fn(OperandType) -> bool| {
            source
                .operands
                .iter()
                .any(|o| pred(o.optype) && o.mask & mask != 0)
        };
        Self {
            source: source.id,
            mask,
            distance: mask.count_ones(),
            target: target.map(|t| t.id),
            opcode,
            gpr: touches(|t| t == OperandType::Gpr),
            fpr: touches(|t| t == OperandType::Fpr),
            csr: touches(|t| t == OperandType::Csr),
            imm: touches(OperandType::is_immediate),
        }
    }

    /// Whether any operand field is touched
    #[must_use]
    pub const fn touches_operands(&self) -> bool {
        self.gpr || self.fpr || self.csr || self.imm
    }
}

/// Per-instruction, per-distance fault counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DistanceStatistics {
    /// `C(bits, d)`
    pub total: u64,
    /// `C(bits - popcount(relevant mask), d)`: faults on don't-care bits only
    pub dont_care: u64,
    /// Faults decoding to nothing
    pub illegal: u64,
    /// Opcode changed, no operand touched
    pub opcode_only: u64,
    /// Operand touched, opcode unchanged
    pub parameter_only: u64,
    /// Opcode changed and operand touched
    pub both: u64,
}

/// Architecture-wide fault counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EdgeSummary {
    /// Every possible fault over every instruction
    pub all: u64,
    /// Faults on don't-care bits only
    pub no_effect: u64,
    /// Faults decoding to nothing
    pub illegal: u64,
    /// Faults on relevant bits that still decode
    pub relevant: u64,
}

/// Every [`InstructionFaultEdge`] of one architecture
#[derive(Debug, Clone, Default)]
pub struct FaultEdgeTable {
    edges: Vec<InstructionFaultEdge>,
    index: HashMap<(InstructionId, u64), usize>,
}

impl FaultEdgeTable {
    /// Classify every legal instruction-memory mask of `space`
    #[must_use]
    pub fn build(arch: &ArchitectureModel, space: &FaultSpace) -> Self {
        let mut table = Self::default();
        for def in arch.instructions() {
            let Some(masks) = space.instruction_masks(def.id) else {
                continue;
            };
            for &mask in masks {
                table.insert(InstructionFaultEdge::classify(arch, def, mask));
            }
        }
        table
    }

    fn insert(&mut self, edge: InstructionFaultEdge) {
        let key = (edge.source, edge.mask);
        if let Some(&i) = self.index.get(&key) {
            self.edges[i] = edge;
        } else {
            self.index.insert(key, self.edges.len());
            self.edges.push(edge);
        }
    }

    /// Edge of `(source, mask)`
    #[must_use]
    pub fn get(&self, source: InstructionId, mask: u64) -> Option<&InstructionFaultEdge> {
        self.index.get(&(source, mask)).map(|&i| &self.edges[i])
    }

    /// Number of edges
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All edges in build order
    pub fn iter(&self) -> impl Iterator<Item = &InstructionFaultEdge> {
        self.edges.iter()
    }

    /// Edges leaving one instruction
    pub fn edges_from(&self, source: InstructionId) -> impl Iterator<Item = &InstructionFaultEdge> {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// Counts per distance for one instruction
    #[must_use]
    pub fn statistics(&self, def: &InstructionDef) -> BTreeMap<u32, DistanceStatistics> {
        let mut stats: BTreeMap<u32, DistanceStatistics> = BTreeMap::new();
        let free = def.free_bits();
        for edge in self.edges_from(def.id) {
            let entry = stats.entry(edge.distance).or_insert_with(|| DistanceStatistics {
                total: binomial(def.bits, edge.distance),
                dont_care: binomial(free, edge.distance),
                ..DistanceStatistics::default()
            });
            let changed = matches!(
                edge.opcode,
                OpcodeEffect::OpcodeChange | OpcodeEffect::ControlFlowChange
            );
            match (edge.opcode, changed, edge.touches_operands()) {
                (OpcodeEffect::Illegal, _, _) => entry.illegal += 1,
                (_, true, false) => entry.opcode_only += 1,
                (_, false, true) => entry.parameter_only += 1,
                (_, true, true) => entry.both += 1,
                (_, false, false) => {}
            }
        }
        stats
    }

    /// Totals over every instruction for faults of exactly `distance` bits
    #[must_use]
    pub fn summary(&self, arch: &ArchitectureModel, distance: u32) -> EdgeSummary {
        let mut out = EdgeSummary::default();
        for def in arch.instructions() {
            out.all += binomial(def.bits, distance);
            out.no_effect += binomial(def.free_bits(), distance);
        }
        for edge in self.edges.iter().filter(|e| e.distance == distance) {
            match edge.opcode {
                OpcodeEffect::Illegal => out.illegal += 1,
                _ => out.relevant += 1,
            }
        }
        out
    }
}
