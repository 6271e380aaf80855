//! Architecture catalog: instruction encodings, registers and memory map.
//!
//! An [`ArchitectureModel`] is built once from a YAML document and then passed
//! by reference to every component. Nothing in the crate looks it up
//! globally.
//!
//! ```yaml
//! name: rv32imc
//! subsets: [I, M, C, Zicsr]
//! limits: { gpr: 2, csr: 1, imem: 2, coremem: 1, ifr: 1 }
//! gprs:
//!   - { name: x1, abi_name: ra, number: 1 }
//! operands:
//!   - { name: rd, short_name: rd, mask: 0xF80, type: gpr }
//! instructions:
//!   - { name: addi, subset: I, mask: 0x707F, opcode: 0x13, operands: [rd, rs1, imm12] }
//! ```

use crate::result::{FaultcovError, FaultcovResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default CSR read/write mask (all 32 bits writable)
pub const DEFAULT_CSR_MASK: u64 = 0xFFFF_FFFF;

/// Index of an instruction definition inside its catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstructionId(pub usize);

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-category limits on simultaneously flipped bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultLimits {
    /// General-purpose registers
    #[serde(alias = "max_faults_gpr")]
    pub gpr: u32,
    /// Control and status registers
    #[serde(alias = "max_faults_csr")]
    pub csr: u32,
    /// Memory-mapped device CSRs
    #[serde(alias = "max_faults_mmcsr")]
    pub mmcsr: u32,
    /// Instruction memory
    #[serde(alias = "max_faults_imem")]
    pub imem: u32,
    /// Core (data) memory
    #[serde(alias = "max_faults_coremem")]
    pub coremem: u32,
    /// Instruction-fetch register
    #[serde(alias = "max_faults_ifr")]
    pub ifr: u32,
}

impl Default for FaultLimits {
    fn default() -> Self {
        Self {
            gpr: 1,
            csr: 1,
            mmcsr: 1,
            imem: 1,
            coremem: 1,
            ifr: 1,
        }
    }
}

/// Kind of an operand field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandType {
    /// General-purpose register
    Gpr,
    /// Floating-point register
    Fpr,
    /// Control and status register
    Csr,
    /// Signed immediate
    Imm,
    /// Unsigned immediate
    Uimm,
    /// Shift amount
    Shamt,
    /// Anything else
    #[default]
    Other,
}

impl OperandType {
    /// Whether the field holds an immediate value
    #[must_use]
    pub const fn is_immediate(self) -> bool {
        matches!(self, Self::Imm | Self::Uimm | Self::Shamt)
    }
}

/// Operand field of an instruction encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandDef {
    /// Unique operand name
    pub name: String,
    /// Short label used in encoding diagrams
    #[serde(default)]
    pub short_name: Option<String>,
    /// Bits occupied by the field
    #[serde(deserialize_with = "de_number")]
    pub mask: u64,
    /// Field kind
    #[serde(rename = "type", default)]
    pub optype: OperandType,
}

/// General-purpose or floating-point register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDef {
    /// Architectural name (`x5`)
    pub name: String,
    /// ABI name (`t0`)
    #[serde(default)]
    pub abi_name: String,
    /// Register number
    #[serde(deserialize_with = "de_number")]
    pub number: u64,
}

impl RegisterDef {
    /// Name as it appears in disassembly
    #[must_use]
    pub fn trace_name(&self) -> &str {
        if self.abi_name.is_empty() {
            &self.name
        } else {
            &self.abi_name
        }
    }
}

/// CSR access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CsrAccess {
    /// Read-only
    #[default]
    #[serde(rename = "RO")]
    ReadOnly,
    /// Read-write
    #[serde(rename = "RW")]
    ReadWrite,
}

/// Control and status register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrDef {
    /// CSR name (`mstatus`)
    pub name: String,
    /// CSR number (`0x300`)
    #[serde(deserialize_with = "de_number")]
    pub number: u64,
    /// Register width
    #[serde(default = "default_bits")]
    pub bits: u32,
    /// Access mode
    #[serde(default)]
    pub access: CsrAccess,
    /// Bits that can hold state; faults outside are structurally impossible
    #[serde(default = "default_csr_mask", deserialize_with = "de_number")]
    pub mask: u64,
}

/// Memory kind of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryType {
    /// Random access memory
    #[serde(rename = "RAM")]
    Ram,
    /// Read-only memory
    #[serde(rename = "ROM")]
    Rom,
    /// Memory-mapped CSR window
    #[serde(rename = "CSR")]
    Csr,
    /// Unspecified
    #[default]
    #[serde(rename = "undefined")]
    Undefined,
}

/// Address range of core or device memory (inclusive bounds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    /// Region name
    pub name: String,
    /// First address
    #[serde(deserialize_with = "de_number")]
    pub from: u64,
    /// Last address (inclusive)
    #[serde(deserialize_with = "de_number")]
    pub to: u64,
    /// Memory kind
    #[serde(rename = "type", default)]
    pub memtype: MemoryType,
    /// Owning device, `None` for core memory
    #[serde(default)]
    pub device: Option<String>,
}

impl MemoryRegion {
    /// Number of bytes in the region
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.to.saturating_sub(self.from).saturating_add(1)
    }

    /// Whether `[lo, hi]` lies completely inside the region
    #[must_use]
    pub const fn contains_range(&self, lo: u64, hi: u64) -> bool {
        self.from <= lo && hi <= self.to
    }
}

/// Memory-mapped CSR of a peripheral device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCsr {
    /// Owning device
    pub device: String,
    /// Register name
    pub name: String,
    /// Bus address
    #[serde(deserialize_with = "de_number")]
    pub address: u64,
    /// Register width (16 or 32)
    #[serde(default = "default_bits")]
    pub bits: u32,
}

/// Disassembly line for an address that never shows up in traces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSeed {
    /// Program counter
    #[serde(deserialize_with = "de_number")]
    pub address: u64,
    /// Disassembly line in trace syntax
    pub line: String,
}

/// Instruction as written in the catalog document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstructionEntry {
    name: String,
    subset: String,
    #[serde(deserialize_with = "de_number")]
    mask: u64,
    #[serde(deserialize_with = "de_number")]
    opcode: u64,
    #[serde(default)]
    bits: Option<u32>,
    #[serde(default)]
    format: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    operands: Vec<String>,
    #[serde(default)]
    requires_subset: Option<String>,
}

/// Decodable instruction: `(mask, opcode, bit width, operand fields)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructionDef {
    /// Position in the decode table
    pub id: InstructionId,
    /// Mnemonic
    pub name: String,
    /// ISA subset the instruction belongs to
    pub subset: String,
    /// Bits compared during decoding
    pub mask: u64,
    /// Expected value of the masked bits
    pub opcode: u64,
    /// Encoding width
    pub bits: u32,
    /// Encoding format (`R`, `I`, `CI`, ...)
    pub format: String,
    /// Free-form kind (`branch`, `jump`, `load`, ...)
    pub kind: String,
    /// Operand fields
    pub operands: Vec<OperandDef>,
}

impl InstructionDef {
    /// Whether `word` decodes to this instruction
    #[must_use]
    pub const fn matches(&self, word: u64) -> bool {
        word & self.mask == self.opcode
    }

    /// Union of the decode mask and every operand mask.
    ///
    /// Bits outside this set never influence decoding and are not faulted.
    #[must_use]
    pub fn relevant_mask(&self) -> u64 {
        self.operands.iter().fold(self.mask, |acc, o| acc | o.mask)
    }

    /// Encoding bits that are neither opcode nor operand
    #[must_use]
    pub fn free_bits(&self) -> u32 {
        self.bits
            .saturating_sub(self.relevant_mask().count_ones())
    }

    /// Branches and jumps
    #[must_use]
    pub fn is_control_flow(&self) -> bool {
        let kind = self.kind.to_ascii_lowercase();
        kind.contains("branch") || kind.contains("jump")
    }
}

/// Two decode-table entries that accept the same encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOverlap {
    /// Entry that wins under first-match order
    pub first: InstructionId,
    /// Entry shadowed for the witness encoding
    pub second: InstructionId,
    /// An encoding matched by both
    pub witness: u64,
}

/// Catalog document as stored on disk
#[derive(Debug, Clone, Deserialize)]
struct CatalogDocument {
    name: String,
    #[serde(default)]
    subsets: Vec<String>,
    #[serde(default)]
    limits: FaultLimits,
    #[serde(default)]
    fault_override: Option<PathBuf>,
    #[serde(default)]
    gprs: Vec<RegisterDef>,
    #[serde(default)]
    fprs: Vec<RegisterDef>,
    #[serde(default)]
    csrs: Vec<CsrDef>,
    #[serde(default)]
    operands: Vec<OperandDef>,
    #[serde(default)]
    instructions: Vec<InstructionEntry>,
    #[serde(default)]
    memory_regions: Vec<MemoryRegion>,
    #[serde(default)]
    device_csrs: Vec<DeviceCsr>,
    #[serde(default)]
    boot_seeds: Vec<BootSeed>,
}

/// Immutable description of one ISA + privilege + platform configuration
#[derive(Debug, Clone)]
pub struct ArchitectureModel {
    name: String,
    subsets: Vec<String>,
    limits: FaultLimits,
    fault_override: Option<PathBuf>,
    gprs: Vec<RegisterDef>,
    fprs: Vec<RegisterDef>,
    csrs: Vec<CsrDef>,
    instructions: Vec<InstructionDef>,
    memory_regions: Vec<MemoryRegion>,
    device_csrs: Vec<DeviceCsr>,
    boot_seeds: Vec<BootSeed>,
    csr_index: HashMap<u64, usize>,
}

impl ArchitectureModel {
    /// Load a catalog from a YAML file.
    ///
    /// A relative `fault_override` path is resolved against the catalog's
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> FaultcovResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FaultcovError::catalog(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut model = Self::from_yaml(&text)?;
        if let (Some(rel), Some(dir)) = (model.fault_override.as_ref(), path.parent()) {
            if rel.is_relative() {
                model.fault_override = Some(dir.join(rel));
            }
        }
        Ok(model)
    }

    /// Parse a catalog from YAML text
    pub fn from_yaml(yaml: &str) -> FaultcovResult<Self> {
        let doc: CatalogDocument = serde_yaml_ng::from_str(yaml)
            .map_err(|e| FaultcovError::catalog(format!("invalid catalog: {e}")))?;
        Self::from_document(doc)
    }

    fn from_document(doc: CatalogDocument) -> FaultcovResult<Self> {
        let operands: HashMap<&str, &OperandDef> =
            doc.operands.iter().map(|o| (o.name.as_str(), o)).collect();
        let subsets: HashSet<&str> = doc.subsets.iter().map(String::as_str).collect();

        let mut instructions = Vec::with_capacity(doc.instructions.len());
        let mut seen_opcodes = HashSet::new();
        for entry in &doc.instructions {
            if let Some(required) = entry.requires_subset.as_deref() {
                if !required.is_empty() && !subsets.contains(required) {
                    continue;
                }
            }
            if entry.opcode & !entry.mask != 0 {
                return Err(FaultcovError::catalog(format!(
                    "instruction {}: opcode 0x{:x} has bits outside mask 0x{:x}",
                    entry.name, entry.opcode, entry.mask
                )));
            }
            if !seen_opcodes.insert((entry.subset.clone(), entry.opcode, entry.mask)) {
                return Err(FaultcovError::catalog(format!(
                    "instruction {}: duplicate encoding in subset {}",
                    entry.name, entry.subset
                )));
            }
            let resolved = entry
                .operands
                .iter()
                .map(|name| {
                    operands.get(name.as_str()).map(|o| (*o).clone()).ok_or_else(|| {
                        FaultcovError::catalog(format!(
                            "instruction {} references unknown operand {name}",
                            entry.name
                        ))
                    })
                })
                .collect::<FaultcovResult<Vec<_>>>()?;
            let bits = entry
                .bits
                .unwrap_or(if entry.subset == "C" { 16 } else { 32 });
            instructions.push(InstructionDef {
                id: InstructionId(instructions.len()),
                name: entry.name.clone(),
                subset: entry.subset.clone(),
                mask: entry.mask,
                opcode: entry.opcode,
                bits,
                format: entry.format.clone(),
                kind: entry.kind.clone(),
                operands: resolved,
            });
        }

        let mut csr_index = HashMap::with_capacity(doc.csrs.len());
        for (i, csr) in doc.csrs.iter().enumerate() {
            if csr_index.insert(csr.number, i).is_some() {
                return Err(FaultcovError::catalog(format!(
                    "duplicate CSR number 0x{:x}",
                    csr.number
                )));
            }
        }
        for region in &doc.memory_regions {
            if region.to < region.from {
                return Err(FaultcovError::catalog(format!(
                    "memory region {} ends before it starts",
                    region.name
                )));
            }
        }

        Ok(Self {
            name: doc.name,
            subsets: doc.subsets,
            limits: doc.limits,
            fault_override: doc.fault_override,
            gprs: doc.gprs,
            fprs: doc.fprs,
            csrs: doc.csrs,
            instructions,
            memory_regions: doc.memory_regions,
            device_csrs: doc.device_csrs,
            boot_seeds: doc.boot_seeds,
            csr_index,
        })
    }

    /// Architecture name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enabled ISA subsets
    #[must_use]
    pub fn subsets(&self) -> &[String] {
        &self.subsets
    }

    /// Fault multiplicity limits
    #[must_use]
    pub const fn limits(&self) -> FaultLimits {
        self.limits
    }

    /// Replace the fault limits
    #[must_use]
    pub const fn with_limits(mut self, limits: FaultLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Location of the layout-derived fault override document
    #[must_use]
    pub fn fault_override_path(&self) -> Option<&Path> {
        self.fault_override.as_deref()
    }

    /// General-purpose registers
    #[must_use]
    pub fn gprs(&self) -> &[RegisterDef] {
        &self.gprs
    }

    /// Floating-point registers
    #[must_use]
    pub fn fprs(&self) -> &[RegisterDef] {
        &self.fprs
    }

    /// Control and status registers
    #[must_use]
    pub fn csrs(&self) -> &[CsrDef] {
        &self.csrs
    }

    /// CSR by number
    #[must_use]
    pub fn csr(&self, number: u64) -> Option<&CsrDef> {
        self.csr_index.get(&number).map(|&i| &self.csrs[i])
    }

    /// Decode table in registration order
    #[must_use]
    pub fn instructions(&self) -> &[InstructionDef] {
        &self.instructions
    }

    /// Instruction by id
    #[must_use]
    pub fn instruction(&self, id: InstructionId) -> Option<&InstructionDef> {
        self.instructions.get(id.0)
    }

    /// Memory regions (core and device)
    #[must_use]
    pub fn memory_regions(&self) -> &[MemoryRegion] {
        &self.memory_regions
    }

    /// Memory-mapped device CSRs
    #[must_use]
    pub fn device_csrs(&self) -> &[DeviceCsr] {
        &self.device_csrs
    }

    /// Fixed boot-code lines
    #[must_use]
    pub fn boot_seeds(&self) -> &[BootSeed] {
        &self.boot_seeds
    }

    /// First instruction whose `(mask, opcode)` accepts `word`
    #[must_use]
    pub fn decode(&self, word: u64) -> Option<&InstructionDef> {
        self.instructions.iter().find(|i| i.matches(word))
    }

    /// Like [`decode`](Self::decode), restricted to one encoding width
    #[must_use]
    pub fn decode_width(&self, word: u64, bits: u32) -> Option<&InstructionDef> {
        self.instructions
            .iter()
            .find(|i| i.bits == bits && i.matches(word))
    }

    /// Every pair of entries that accept a common encoding.
    ///
    /// Width is ignored because [`decode`](Self::decode) is width-blind: a
    /// 16-bit entry registered first shadows any 32-bit word it accepts.
    /// Two entries overlap iff their opcodes agree on the bits both masks
    /// compare; `opcode_a | opcode_b` is then a witness.
    #[must_use]
    pub fn decode_overlaps(&self) -> Vec<DecodeOverlap> {
        let mut overlaps = Vec::new();
        for (i, a) in self.instructions.iter().enumerate() {
            for b in &self.instructions[i + 1..] {
                if (a.opcode ^ b.opcode) & a.mask & b.mask == 0 {
                    overlaps.push(DecodeOverlap {
                        first: a.id,
                        second: b.id,
                        witness: a.opcode | b.opcode,
                    });
                }
            }
        }
        overlaps
    }

    /// Fail on the first decode overlap
    pub fn validate_unambiguous(&self) -> FaultcovResult<()> {
        match self.decode_overlaps().first() {
            None => Ok(()),
            Some(o) => Err(FaultcovError::AmbiguousEncoding {
                first: self.instructions[o.first.0].name.clone(),
                second: self.instructions[o.second.0].name.clone(),
                word: o.witness,
            }),
        }
    }

    /// Memory region containing `[lo, hi]`
    #[must_use]
    pub fn region_containing(&self, lo: u64, hi: u64) -> Option<&MemoryRegion> {
        self.memory_regions
            .iter()
            .find(|r| r.contains_range(lo, hi))
    }

    /// Device CSR mapped at `address`
    #[must_use]
    pub fn device_csr_at(&self, address: u64) -> Option<(usize, &DeviceCsr)> {
        self.device_csrs
            .iter()
            .enumerate()
            .find(|(_, c)| c.address == address)
    }

    /// GPRs keyed by trace name
    #[must_use]
    pub fn gprs_by_trace_name(&self) -> BTreeMap<&str, &RegisterDef> {
        self.gprs.iter().map(|r| (r.trace_name(), r)).collect()
    }
}

const fn default_bits() -> u32 {
    32
}

const fn default_csr_mask() -> u64 {
    DEFAULT_CSR_MASK
}

/// Accept `42`, `"42"` and `"0x2A"` for numeric fields
fn de_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        Number::Text(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
pub fn parse_number(text: &str) -> Result<u64, String> {
    let t = text.trim().replace('_', "");
    let parsed = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        t.parse::<u64>()
    };
    parsed.map_err(|e| format!("invalid number {text:?}: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    /// Small RV32 catalog shared by the unit tests of the crate
    pub(crate) const RV32_SAMPLE: &str = r#"
name: rv32-sample
subsets: [I, Zicsr, M-mode]
limits: { gpr: 1, csr: 1, imem: 1, coremem: 1, ifr: 1 }
gprs:
  - { name: x0, abi_name: zero, number: 0 }
  - { name: x1, abi_name: ra, number: 1 }
  - { name: x2, abi_name: sp, number: 2 }
  - { name: x5, abi_name: t0, number: 5 }
  - { name: x10, abi_name: a0, number: 10 }
  - { name: x11, abi_name: a1, number: 11 }
  - { name: x12, abi_name: a2, number: 12 }
fprs:
  - { name: f0, abi_name: ft0, number: 0 }
csrs:
  - { name: mstatus, number: 0x300, access: RW, mask: 0x88 }
  - { name: mhartid, number: 0xF14, access: RO }
operands:
  - { name: rd, short_name: rd, mask: 0xF80, type: gpr }
  - { name: rs1, short_name: rs1, mask: 0xF8000, type: gpr }
  - { name: rs2, short_name: rs2, mask: 0x1F00000, type: gpr }
  - { name: imm12, short_name: imm, mask: 0xFFF00000, type: imm }
  - { name: csr, short_name: csr, mask: 0xFFF00000, type: csr }
  - { name: imm20, short_name: imm, mask: 0xFFFFF000, type: imm }
  - { name: bimm, short_name: imm, mask: 0xFE000F80, type: imm }
instructions:
  - { name: addi, subset: I, mask: 0x707F, opcode: 0x13, format: I, kind: arith, operands: [rd, rs1, imm12] }
  - { name: add, subset: I, mask: 0xFE00707F, opcode: 0x33, format: R, kind: arith, operands: [rd, rs1, rs2] }
  - { name: sub, subset: I, mask: 0xFE00707F, opcode: 0x40000033, format: R, kind: arith, operands: [rd, rs1, rs2] }
  - { name: auipc, subset: I, mask: 0x7F, opcode: 0x17, format: U, kind: arith, operands: [rd, imm20] }
  - { name: lw, subset: I, mask: 0x707F, opcode: 0x2003, format: I, kind: load, operands: [rd, rs1, imm12] }
  - { name: beq, subset: I, mask: 0x707F, opcode: 0x63, format: B, kind: branch, operands: [rs1, rs2, bimm] }
  - { name: bne, subset: I, mask: 0x707F, opcode: 0x1063, format: B, kind: branch, operands: [rs1, rs2, bimm] }
  - { name: csrrs, subset: Zicsr, mask: 0x707F, opcode: 0x2073, format: I, kind: csr, operands: [rd, rs1, csr] }
  - { name: mret, subset: M-mode, mask: 0xFFFFFFFF, opcode: 0x30200073, format: I, kind: jump }
  - { name: fld, subset: D, mask: 0x707F, opcode: 0x3007, format: I, kind: load, operands: [rd, rs1, imm12], requires_subset: D }
memory_regions:
  - { name: ram, from: 0x80000000, to: 0x8000FFFF, type: RAM }
  - { name: rom, from: 0x1000, to: 0x1FFF, type: ROM }
  - { name: uart, from: 0x10000000, to: 0x100000FF, type: CSR, device: uart0 }
device_csrs:
  - { device: uart0, name: txdata, address: 0x10000000, bits: 32 }
  - { device: uart0, name: ctrl, address: 0x10000008, bits: 16 }
boot_seeds:
  - { address: 0x1004, line: "0x00001004:  02828613          addi            a2,t0,40" }
  - { address: 0x1008, line: "0x00001008:  f1402573          csrrs           a0,mhartid,zero" }
"#;

    pub(crate) fn sample() -> ArchitectureModel {
        ArchitectureModel::from_yaml(RV32_SAMPLE).expect("sample catalog parses")
    }

    mod loading_tests {
        use super::*;

        #[test]
        fn test_sample_parses() {
            let arch = sample();
            assert_eq!(arch.name(), "rv32-sample");
            assert_eq!(arch.gprs().len(), 7);
            assert_eq!(arch.csrs().len(), 2);
            assert_eq!(arch.limits(), FaultLimits::default());
        }

        #[test]
        fn test_requires_subset_excludes_instruction() {
            let arch = sample();
            assert!(arch.instructions().iter().all(|i| i.name != "fld"));
        }

        #[test]
        fn test_ids_follow_registration_order() {
            let arch = sample();
            for (i, insn) in arch.instructions().iter().enumerate() {
                assert_eq!(insn.id, InstructionId(i));
            }
        }

        #[test]
        fn test_csr_mask_default() {
            let arch = sample();
            assert_eq!(arch.csr(0xF14).unwrap().mask, DEFAULT_CSR_MASK);
            assert_eq!(arch.csr(0x300).unwrap().mask, 0x88);
            assert_eq!(arch.csr(0x300).unwrap().access, CsrAccess::ReadWrite);
        }

        #[test]
        fn test_unknown_operand_rejected() {
            let yaml = r"
name: broken
instructions:
  - { name: addi, subset: I, mask: 0x707F, opcode: 0x13, operands: [nope] }
";
            let err = ArchitectureModel::from_yaml(yaml).unwrap_err();
            assert!(err.to_string().contains("unknown operand nope"));
            assert!(err.is_fatal());
        }

        #[test]
        fn test_opcode_outside_mask_rejected() {
            let yaml = r"
name: broken
instructions:
  - { name: bad, subset: I, mask: 0x7F, opcode: 0x1013 }
";
            assert!(ArchitectureModel::from_yaml(yaml).is_err());
        }

        #[test]
        fn test_compressed_default_width() {
            let yaml = r"
name: rvc
subsets: [C]
instructions:
  - { name: c.nop, subset: C, mask: 0xFFFF, opcode: 0x1 }
";
            let arch = ArchitectureModel::from_yaml(yaml).unwrap();
            assert_eq!(arch.instructions()[0].bits, 16);
        }

        #[test]
        fn test_string_numbers_accepted() {
            let yaml = r#"
name: strings
gprs:
  - { name: x1, number: "1" }
csrs:
  - { name: mepc, number: "0x341", mask: "0xFFFFFFFC" }
"#;
            let arch = ArchitectureModel::from_yaml(yaml).unwrap();
            assert_eq!(arch.csr(0x341).unwrap().mask, 0xFFFF_FFFC);
            assert_eq!(arch.gprs()[0].number, 1);
        }

        #[test]
        fn test_load_resolves_override_relative_to_catalog() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("arch.yaml");
            std::fs::write(&path, "name: a\nfault_override: cla.yaml\n").unwrap();
            let arch = ArchitectureModel::load(&path).unwrap();
            assert_eq!(arch.fault_override_path(), Some(dir.path().join("cla.yaml").as_path()));
        }

        #[test]
        fn test_load_missing_file_is_catalog_error() {
            let err = ArchitectureModel::load("/nonexistent/arch.yaml").unwrap_err();
            assert!(matches!(err, FaultcovError::Catalog { .. }));
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decode_addi() {
            let arch = sample();
            // addi a2,t0,40
            assert_eq!(arch.decode(0x0282_8613).unwrap().name, "addi");
        }

        #[test]
        fn test_decode_add_vs_sub() {
            let arch = sample();
            assert_eq!(arch.decode(0x0000_0033).unwrap().name, "add");
            assert_eq!(arch.decode(0x4000_0033).unwrap().name, "sub");
        }

        #[test]
        fn test_decode_unknown() {
            let arch = sample();
            assert!(arch.decode(0x0000_007F).is_none());
        }

        #[test]
        fn test_relevant_mask_and_free_bits() {
            let arch = sample();
            let auipc = arch.decode(0x17).unwrap();
            assert_eq!(auipc.relevant_mask(), 0xFFFF_FFFF);
            assert_eq!(auipc.free_bits(), 0);
            let mret = arch.decode(0x3020_0073).unwrap();
            assert_eq!(mret.free_bits(), 0);
            assert!(mret.is_control_flow());
        }

        #[test]
        fn test_sample_is_unambiguous() {
            let arch = sample();
            assert!(arch.decode_overlaps().is_empty());
            assert!(arch.validate_unambiguous().is_ok());
        }

        #[test]
        fn test_overlap_detected() {
            let yaml = r"
name: overlap
instructions:
  - { name: addi, subset: I, mask: 0x707F, opcode: 0x13 }
  - { name: nop, subset: I, mask: 0xFFFFFFFF, opcode: 0x13 }
";
            let arch = ArchitectureModel::from_yaml(yaml).unwrap();
            let overlaps = arch.decode_overlaps();
            assert_eq!(overlaps.len(), 1);
            assert_eq!(overlaps[0].witness, 0x13);
            let err = arch.validate_unambiguous().unwrap_err();
            assert!(err.to_string().contains("addi"));
            assert!(err.to_string().contains("nop"));
        }

        #[test]
        fn test_cross_width_overlap_detected() {
            let yaml = r"
name: mixed
instructions:
  - { name: c_any, subset: C, bits: 16, mask: 0x3, opcode: 0x3 }
  - { name: addi, subset: I, mask: 0x707F, opcode: 0x13 }
";
            let arch = ArchitectureModel::from_yaml(yaml).unwrap();
            assert_eq!(arch.decode(0x513).unwrap().name, "c_any");
            let overlaps = arch.decode_overlaps();
            assert_eq!(overlaps.len(), 1);
            assert!(arch.decode(overlaps[0].witness).is_some());
            assert!(arch.validate_unambiguous().is_err());
        }

        #[test]
        fn test_compressed_quadrants_do_not_overlap() {
            let yaml = r"
name: rvc
instructions:
  - { name: c_addi, subset: C, bits: 16, mask: 0xE003, opcode: 0x1 }
  - { name: addi, subset: I, mask: 0x707F, opcode: 0x13 }
";
            let arch = ArchitectureModel::from_yaml(yaml).unwrap();
            assert!(arch.decode_overlaps().is_empty());
        }
    }

    mod memory_tests {
        use super::*;

        #[test]
        fn test_region_containing() {
            let arch = sample();
            assert_eq!(arch.region_containing(0x8000_0000, 0x8000_0003).unwrap().name, "ram");
            assert!(arch.region_containing(0x8000_FFFE, 0x8001_0001).is_none());
        }

        #[test]
        fn test_device_csr_at() {
            let arch = sample();
            let (idx, csr) = arch.device_csr_at(0x1000_0008).unwrap();
            assert_eq!(idx, 1);
            assert_eq!(csr.bits, 16);
        }

        #[test]
        fn test_region_size() {
            let arch = sample();
            assert_eq!(arch.memory_regions()[0].size(), 0x1_0000);
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x1F"), Ok(31));
        assert_eq!(parse_number("42"), Ok(42));
        assert_eq!(parse_number("0xFFFF_FFFF"), Ok(0xFFFF_FFFF));
        assert!(parse_number("zz").is_err());
    }
}
