use super::lines::{parse_line, RegisterFile, TraceLine};
use super::AccessSummary;
use crate::catalog::{ArchitectureModel, InstructionId};
use crate::result::FaultcovResult;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// One decoded disassembly line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DecodedInstruction {
    /// Program counter
    pub address: u64,
    /// Matched definition
    pub instruction: InstructionId,
}

/// Referenced register names split by register file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterClassification {
    /// GPR numbers
    pub gprs: BTreeSet<u64>,
    /// FPR numbers
    pub fprs: BTreeSet<u64>,
    /// CSR numbers
    pub csrs: BTreeSet<u64>,
    /// Names matching no register of the catalog
    pub unknown: BTreeSet<String>,
}

/// Structured view of one golden-run trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodedTrace {
    pc2insn: BTreeMap<u64, InstructionId>,
    instructions: Vec<DecodedInstruction>,
    undecoded: BTreeSet<u64>,
    register_names: BTreeSet<String>,
    gpr: BTreeMap<u64, AccessSummary>,
    csr: BTreeMap<u64, AccessSummary>,
    mem8: BTreeMap<u64, AccessSummary>,
    mem16: BTreeMap<u64, AccessSummary>,
    mem32: BTreeMap<u64, AccessSummary>,
    memory_range: Option<(u64, u64)>,
    executions: BTreeMap<InstructionId, u64>,
    instances: BTreeMap<InstructionId, u64>,
}

impl DecodedTrace {
    /// Decoded instruction per address, boot seeds included
    #[must_use]
    pub const fn address_map(&self) -> &BTreeMap<u64, InstructionId> {
        &self.pc2insn
    }

    /// Instruction at `address`
    #[must_use]
    pub fn instruction_at(&self, address: u64) -> Option<InstructionId> {
        self.pc2insn.get(&address).copied()
    }

    /// Decoded disassembly lines in trace order
    #[must_use]
    pub fn instructions(&self) -> &[DecodedInstruction] {
        &self.instructions
    }

    /// Distinct `(address, instruction)` pairs seen in the trace
    #[must_use]
    pub fn instruction_sites(&self) -> BTreeSet<DecodedInstruction> {
        self.instructions.iter().copied().collect()
    }

    /// Addresses whose encoding matched no definition
    #[must_use]
    pub const fn undecoded(&self) -> &BTreeSet<u64> {
        &self.undecoded
    }

    /// Every register name referenced by operand text
    #[must_use]
    pub const fn register_names(&self) -> &BTreeSet<String> {
        &self.register_names
    }

    /// GPR access summaries by register number
    #[must_use]
    pub const fn gpr_accesses(&self) -> &BTreeMap<u64, AccessSummary> {
        &self.gpr
    }

    /// CSR access summaries by register number
    #[must_use]
    pub const fn csr_accesses(&self) -> &BTreeMap<u64, AccessSummary> {
        &self.csr
    }

    /// Memory access summaries keyed by address for a width in bytes
    #[must_use]
    pub const fn memory_accesses(&self, size: u8) -> Option<&BTreeMap<u64, AccessSummary>> {
        match size {
            1 => Some(&self.mem8),
            2 => Some(&self.mem16),
            4 => Some(&self.mem32),
            _ => None,
        }
    }

    /// Lowest and highest byte touched by any memory access
    #[must_use]
    pub const fn memory_range(&self) -> Option<(u64, u64)> {
        self.memory_range
    }

    /// Every byte address covered by a memory access of any width
    #[must_use]
    pub fn touched_bytes(&self) -> BTreeSet<u64> {
        let mut bytes: BTreeSet<u64> = self.mem8.keys().copied().collect();
        for (&addr, span) in self
            .mem16
            .keys()
            .map(|a| (a, 2u64))
            .chain(self.mem32.keys().map(|a| (a, 4u64)))
        {
            bytes.extend((0..span).map(|off| addr.saturating_add(off)));
        }
        bytes
    }

    /// Summed execution counts per instruction definition
    #[must_use]
    pub const fn executions(&self) -> &BTreeMap<InstructionId, u64> {
        &self.executions
    }

    /// Number of distinct addresses holding each instruction definition
    #[must_use]
    pub const fn instances(&self) -> &BTreeMap<InstructionId, u64> {
        &self.instances
    }

    /// Total dynamic instruction count
    #[must_use]
    pub fn total_executions(&self) -> u64 {
        self.executions.values().sum()
    }

    /// Total static instruction count
    #[must_use]
    pub fn total_instances(&self) -> u64 {
        self.instances.values().sum()
    }

    /// Classify referenced register names against the catalog
    #[must_use]
    pub fn classify_registers(&self, arch: &ArchitectureModel) -> RegisterClassification {
        let mut out = RegisterClassification::default();
        for name in &self.register_names {
            if let Some(r) = arch.gprs().iter().find(|r| r.trace_name() == name) {
                out.gprs.insert(r.number);
            } else if let Some(r) = arch.fprs().iter().find(|r| r.trace_name() == name) {
                out.fprs.insert(r.number);
            } else if let Some(c) = arch.csrs().iter().find(|c| c.name == *name) {
                out.csrs.insert(c.number);
            } else {
                out.unknown.insert(name.clone());
            }
        }
        out
    }

    fn record_memory(&mut self, size: u8, address: u64, summary: AccessSummary) {
        let map = match size {
            1 => &mut self.mem8,
            2 => &mut self.mem16,
            _ => &mut self.mem32,
        };
        map.insert(address, summary);
        let last = address.saturating_add(u64::from(size) - 1);
        self.memory_range = Some(match self.memory_range {
            None => (address, last),
            Some((lo, hi)) => (lo.min(address), hi.max(last)),
        });
    }
}

/// Decodes trace text against one architecture
#[derive(Debug, Clone, Copy)]
pub struct TraceDecoder<'a> {
    arch: &'a ArchitectureModel,
}

impl<'a> TraceDecoder<'a> {
    /// Create a decoder for `arch`
    #[must_use]
    pub const fn new(arch: &'a ArchitectureModel) -> Self {
        Self { arch }
    }

    /// Read and decode a trace file
    pub fn decode_file(&self, path: impl AsRef<Path>) -> FaultcovResult<DecodedTrace> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.decode(&text))
    }

    /// Decode trace text.
    ///
    /// Never fails: unmatched encodings and unresolved execution addresses
    /// are logged and skipped, unrecognised lines are ignored.
    #[must_use]
    pub fn decode(&self, text: &str) -> DecodedTrace {
        let mut trace = DecodedTrace::default();
        self.seed_boot_code(&mut trace);

        let parsed: Vec<TraceLine<'_>> = text.lines().filter_map(parse_line).collect();

        for line in &parsed {
            if let TraceLine::Instruction(insn) = line {
                trace
                    .register_names
                    .extend(insn.registers().map(str::to_owned));
                if let Some(def) = self.arch.decode(insn.word) {
                    trace.pc2insn.insert(insn.address, def.id);
                    trace.instructions.push(DecodedInstruction {
                        address: insn.address,
                        instruction: def.id,
                    });
                } else {
                    warn!(
                        "cannot match opcode '{} ({})' @ 0x{:08x}",
                        insn.encoding, insn.mnemonic, insn.address
                    );
                    trace.undecoded.insert(insn.address);
                }
            }
        }

        for line in parsed {
            match line {
                TraceLine::Instruction(_) => {}
                TraceLine::Register {
                    file: RegisterFile::Gpr,
                    index,
                    summary,
                } => {
                    if trace.gpr.insert(index, summary).is_some() {
                        warn!("GPR {index} summarised twice, keeping the last line");
                    }
                }
                TraceLine::Register {
                    file: RegisterFile::Csr,
                    index,
                    summary,
                } => {
                    trace.csr.insert(index, summary);
                }
                TraceLine::Memory {
                    size,
                    address,
                    summary,
                } => trace.record_memory(size, address, summary),
                TraceLine::Execution { pc, count } => match trace.pc2insn.get(&pc) {
                    Some(&id) => {
                        *trace.executions.entry(id).or_insert(0) += count;
                    }
                    None => warn!("instruction @ 0x{pc:x} not found in trace"),
                },
            }
        }

        for &id in trace.pc2insn.values() {
            *trace.instances.entry(id).or_insert(0) += 1;
        }

        debug!(
            addresses = trace.pc2insn.len(),
            undecoded = trace.undecoded.len(),
            gprs = trace.gpr.len(),
            csrs = trace.csr.len(),
            "decoded trace"
        );
        trace
    }

    fn seed_boot_code(&self, trace: &mut DecodedTrace) {
        for seed in self.arch.boot_seeds() {
            let decoded = match parse_line(&seed.line) {
                Some(TraceLine::Instruction(insn)) => self.arch.decode(insn.word),
                _ => None,
            };
            match decoded {
                Some(def) => {
                    trace.pc2insn.insert(seed.address, def.id);
                }
                None => warn!("boot seed @ 0x{:08x} does not decode", seed.address),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample;

    const TRACE: &str = "\
Golden run start
0x80000000:  00000513          addi            a0,zero,0
0x80000004:  00a58633          add             a2,a1,a0
0x80000008:  0002a583          lw              a1,0(t0)
0x8000000c:  0000007f          unknown
0x80000000:  00000513          addi            a0,zero,0
GPR[10]:2,1,3
GPR[11]:1,1,2
GPR[12]:0,1,1
CSR[768]:1,2,3
CSR[4095]:1,1,2
MEM_8[80001000]:1,0,1
MEM_16[80001004]:0,1,1
MEM_32[80001010]:1,1,2
EXE[80000000]:4
EXE[80000004]:2
EXE[1004]:1
EXE[90000000]:3
";

    mod decode_tests {
        use super::*;

        #[test]
        fn test_address_map_includes_boot_seeds() {
            let arch = sample();
            let trace = TraceDecoder::new(&arch).decode(TRACE);
            let addi = arch.decode(0x13).unwrap().id;
            assert_eq!(trace.instruction_at(0x1004), Some(addi));
            assert!(trace.instruction_at(0x1008).is_some());
            assert_eq!(trace.instruction_at(0x8000_0000), Some(addi));
        }

        #[test]
        fn test_unmatched_opcode_is_skipped() {
            let arch = sample();
            let trace = TraceDecoder::new(&arch).decode(TRACE);
            assert!(trace.undecoded().contains(&0x8000_000c));
            assert_eq!(trace.instruction_at(0x8000_000c), None);
            assert_eq!(trace.instructions().len(), 4);
            assert_eq!(trace.instruction_sites().len(), 3);
        }

        #[test]
        fn test_register_summaries() {
            let arch = sample();
            let trace = TraceDecoder::new(&arch).decode(TRACE);
            assert_eq!(trace.gpr_accesses()[&10], AccessSummary::new(2, 1));
            assert_eq!(trace.csr_accesses()[&768].writes, 2);
            assert_eq!(trace.csr_accesses().len(), 2);
        }

        #[test]
        fn test_memory_range_spans_wide_accesses() {
            let arch = sample();
            let trace = TraceDecoder::new(&arch).decode(TRACE);
            assert_eq!(trace.memory_range(), Some((0x8000_1000, 0x8000_1013)));
            let bytes = trace.touched_bytes();
            assert_eq!(bytes.len(), 1 + 2 + 4);
            assert!(bytes.contains(&0x8000_1005));
            assert!(bytes.contains(&0x8000_1013));
        }

        #[test]
        fn test_executions_and_instances() {
            let arch = sample();
            let trace = TraceDecoder::new(&arch).decode(TRACE);
            let addi = arch.decode(0x13).unwrap().id;
            let add = arch.decode(0x33).unwrap().id;
            // 4 at 0x80000000 plus 1 at the boot seed 0x1004
            assert_eq!(trace.executions()[&addi], 5);
            assert_eq!(trace.executions()[&add], 2);
            assert_eq!(trace.total_executions(), 7);
            // addi at 0x1004 and 0x80000000
            assert_eq!(trace.instances()[&addi], 2);
            assert_eq!(trace.total_instances(), 5);
        }

        #[test]
        fn test_decode_is_idempotent() {
            let arch = sample();
            let decoder = TraceDecoder::new(&arch);
            assert_eq!(decoder.decode(TRACE), decoder.decode(TRACE));
        }

        #[test]
        fn test_duplicate_gpr_summary_keeps_last() {
            let arch = sample();
            let trace = TraceDecoder::new(&arch).decode("GPR[5]:1,1,2\nGPR[5]:4,4,8\n");
            assert_eq!(trace.gpr_accesses()[&5].total, 8);
        }

        #[test]
        fn test_empty_trace() {
            let arch = sample();
            let trace = TraceDecoder::new(&arch).decode("");
            assert!(trace.instructions().is_empty());
            assert_eq!(trace.memory_range(), None);
            assert!(trace.touched_bytes().is_empty());
        }
    }

    mod classification_tests {
        use super::*;

        #[test]
        fn test_classify_registers() {
            let arch = sample();
            let text = "\
0x80000000:  00000513  addi  a0,zero,0
0x80000004:  30002573  csrrs a0,mstatus,zero
0x80000008:  00000513  addi  ft0,s11,0
";
            let trace = TraceDecoder::new(&arch).decode(text);
            let classes = trace.classify_registers(&arch);
            assert!(classes.gprs.contains(&10));
            assert!(classes.gprs.contains(&0));
            assert!(classes.csrs.contains(&0x300));
            assert!(classes.fprs.contains(&0));
            assert!(classes.unknown.contains("s11"));
        }
    }

    #[test]
    fn test_decode_file() {
        let arch = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("golden.trace");
        std::fs::write(&path, TRACE).unwrap();
        let trace = TraceDecoder::new(&arch).decode_file(&path).unwrap();
        assert_eq!(trace.gpr_accesses().len(), 3);
    }
}
