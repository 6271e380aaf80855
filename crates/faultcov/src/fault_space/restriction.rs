//! Sources of legal fault masks per structure.

use super::{enumerate, restrict_to_mask, StructureKind};
use crate::catalog::{parse_number, ArchitectureModel, FaultLimits, InstructionId};
use crate::result::{FaultcovError, FaultcovResult};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Supplies the structures that can be faulted and their legal masks.
///
/// Returning `None` means the source has no opinion and the caller falls
/// back to [`NaiveEnumeration`].
pub trait FaultRestrictionSource: std::fmt::Debug {
    /// Identifiers of every faultable structure of `kind`
    fn structure_ids(&self, kind: StructureKind) -> Option<Vec<u64>>;

    /// Legal fault masks of one structure
    fn legal_masks(&self, kind: StructureKind, id: u64) -> Option<BTreeSet<u64>>;
}

/// Combinatorial enumeration from the catalog alone
#[derive(Debug, Clone)]
pub struct NaiveEnumeration {
    limits: FaultLimits,
    gprs: Vec<u64>,
    csrs: BTreeMap<u64, (u32, u64)>,
    instructions: BTreeMap<u64, (u32, u64)>,
    device_csrs: BTreeMap<u64, u32>,
}

impl NaiveEnumeration {
    /// Derive structures and widths from `arch`
    #[must_use]
    pub fn new(arch: &ArchitectureModel) -> Self {
        Self {
            limits: arch.limits(),
            gprs: arch
                .gprs()
                .iter()
                .map(|r| r.number)
                .filter(|&n| n != 0)
                .collect(),
            csrs: arch
                .csrs()
                .iter()
                .filter(|c| c.mask != 0)
                .map(|c| (c.number, (c.bits, c.mask)))
                .collect(),
            instructions: arch
                .instructions()
                .iter()
                .map(|i| (i.id.0 as u64, (i.bits, i.relevant_mask())))
                .collect(),
            device_csrs: arch
                .device_csrs()
                .iter()
                .enumerate()
                .map(|(idx, c)| (idx as u64, c.bits))
                .collect(),
        }
    }
}

impl FaultRestrictionSource for NaiveEnumeration {
    fn structure_ids(&self, kind: StructureKind) -> Option<Vec<u64>> {
        Some(match kind {
            StructureKind::Gpr => self.gprs.clone(),
            StructureKind::Csr => self.csrs.keys().copied().collect(),
            StructureKind::InstructionMemory => self.instructions.keys().copied().collect(),
            StructureKind::DeviceCsr => self.device_csrs.keys().copied().collect(),
            StructureKind::InstructionFetchRegister | StructureKind::CoreMemory => vec![0],
        })
    }

    fn legal_masks(&self, kind: StructureKind, id: u64) -> Option<BTreeSet<u64>> {
        match kind {
            StructureKind::Gpr => self
                .gprs
                .contains(&id)
                .then(|| enumerate(32, self.limits.gpr).into_iter().collect()),
            StructureKind::Csr => self
                .csrs
                .get(&id)
                .map(|&(bits, mask)| restrict_to_mask(&enumerate(bits, self.limits.csr), mask)),
            StructureKind::InstructionMemory => self
                .instructions
                .get(&id)
                .map(|&(bits, mask)| restrict_to_mask(&enumerate(bits, self.limits.imem), mask)),
            StructureKind::DeviceCsr => self
                .device_csrs
                .get(&id)
                .map(|&bits| enumerate(if bits == 16 { 16 } else { 32 }, self.limits.mmcsr).into_iter().collect()),
            StructureKind::InstructionFetchRegister => {
                Some(enumerate(32, self.limits.ifr).into_iter().collect())
            }
            StructureKind::CoreMemory => Some(enumerate(8, self.limits.coremem).into_iter().collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(u64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct OverrideDocument {
    #[serde(default)]
    gprs: BTreeMap<String, Vec<RawNumber>>,
    #[serde(default)]
    csrs: BTreeMap<String, Vec<RawNumber>>,
}

/// Layout-derived legal masks for GPRs and CSRs.
///
/// ```yaml
/// gprs:
///   1: [0x1, 0x2, 0x3]      # decimal register number
/// csrs:
///   "300": [0x8, 0x80]      # hexadecimal CSR number
/// ```
///
/// Masks with more set bits than the category limit are dropped on load.
/// Only GPRs and CSRs are answered; every other kind falls back to the naive
/// enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultOverride {
    gprs: BTreeMap<u64, BTreeSet<u64>>,
    csrs: BTreeMap<u64, BTreeSet<u64>>,
}

impl FaultOverride {
    /// Load an override document from disk
    pub fn load(path: impl AsRef<Path>, limits: FaultLimits) -> FaultcovResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FaultcovError::fault_override(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text, limits)
    }

    /// Parse an override document
    pub fn from_yaml(yaml: &str, limits: FaultLimits) -> FaultcovResult<Self> {
        let doc: OverrideDocument = serde_yaml_ng::from_str(yaml)
            .map_err(|e| FaultcovError::fault_override(format!("invalid override: {e}")))?;
        Ok(Self {
            gprs: convert_section(doc.gprs, 10, limits.gpr)?,
            csrs: convert_section(doc.csrs, 16, limits.csr)?,
        })
    }

    /// Number of GPRs and CSRs listed
    #[must_use]
    pub fn len(&self) -> usize {
        self.gprs.len() + self.csrs.len()
    }

    /// Whether nothing is listed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn convert_section(
    raw: BTreeMap<String, Vec<RawNumber>>,
    radix: u32,
    limit: u32,
) -> FaultcovResult<BTreeMap<u64, BTreeSet<u64>>> {
    raw.into_iter()
        .map(|(key, values)| {
            let digits = key.trim();
            let digits = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
                .unwrap_or(digits);
            let id = u64::from_str_radix(digits, radix).map_err(|e| {
                FaultcovError::fault_override(format!("invalid register key {key:?}: {e}"))
            })?;
            let masks = values
                .into_iter()
                .map(|v| match v {
                    RawNumber::Int(n) => Ok(n),
                    RawNumber::Text(s) => parse_number(&s).map_err(FaultcovError::fault_override),
                })
                .filter(|m| m.as_ref().map_or(true, |&m| m != 0 && m.count_ones() <= limit))
                .collect::<FaultcovResult<BTreeSet<u64>>>()?;
            Ok((id, masks))
        })
        .collect()
}

impl FaultRestrictionSource for FaultOverride {
    fn structure_ids(&self, kind: StructureKind) -> Option<Vec<u64>> {
        match kind {
            StructureKind::Gpr => Some(self.gprs.keys().copied().collect()),
            StructureKind::Csr => Some(self.csrs.keys().copied().collect()),
            _ => None,
        }
    }

    fn legal_masks(&self, kind: StructureKind, id: u64) -> Option<BTreeSet<u64>> {
        match kind {
            StructureKind::Gpr => Some(self.gprs.get(&id).cloned().unwrap_or_default()),
            StructureKind::Csr => Some(self.csrs.get(&id).cloned().unwrap_or_default()),
            _ => None,
        }
    }
}

/// Instruction ids are stored as `u64` keys by the sources
pub(crate) const fn instruction_key(id: InstructionId) -> u64 {
    id.0 as u64
}
