//! Architecture-wide universe of fault tokens.

use super::{FaultSpace, StructureKind};
use crate::catalog::{parse_number, ArchitectureModel, InstructionId};
use crate::result::{FaultcovError, FaultcovResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One `(structure, bitmask)` fault in canonical form.
///
/// Rendered as `g,<n>,0x%08x`, `c,<n>,0x%08x`, `mcsr,<idx>,0x%08x`,
/// `i,<id>,0x%08x`, `f,0,0x%08x` or `m,0x%08x,0x%08x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaultToken {
    /// GPR fault
    Gpr {
        /// Register number
        number: u64,
        /// Flipped bits
        mask: u64,
    },
    /// CSR fault
    Csr {
        /// CSR number
        number: u64,
        /// Flipped bits
        mask: u64,
    },
    /// Memory-mapped device CSR fault
    DeviceCsr {
        /// Index in the catalog's device CSR list
        index: u64,
        /// Flipped bits
        mask: u64,
    },
    /// Instruction encoding fault
    Instruction {
        /// Faulted instruction definition
        id: InstructionId,
        /// Flipped bits
        mask: u64,
    },
    /// Instruction-fetch register fault
    FetchRegister {
        /// Flipped bits
        mask: u64,
    },
    /// Core-memory byte fault
    CoreMemory {
        /// Byte address
        address: u64,
        /// Flipped bits
        mask: u64,
    },
}

impl FaultToken {
    /// Structure kind of the token
    #[must_use]
    pub const fn kind(&self) -> StructureKind {
        match self {
            Self::Gpr { .. } => StructureKind::Gpr,
            Self::Csr { .. } => StructureKind::Csr,
            Self::DeviceCsr { .. } => StructureKind::DeviceCsr,
            Self::Instruction { .. } => StructureKind::InstructionMemory,
            Self::FetchRegister { .. } => StructureKind::InstructionFetchRegister,
            Self::CoreMemory { .. } => StructureKind::CoreMemory,
        }
    }
}

impl fmt::Display for FaultToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpr { number, mask } => write!(f, "g,{number},0x{mask:08x}"),
            Self::Csr { number, mask } => write!(f, "c,{number},0x{mask:08x}"),
            Self::DeviceCsr { index, mask } => write!(f, "mcsr,{index},0x{mask:08x}"),
            Self::Instruction { id, mask } => write!(f, "i,{id},0x{mask:08x}"),
            Self::FetchRegister { mask } => write!(f, "f,0,0x{mask:08x}"),
            Self::CoreMemory { address, mask } => write!(f, "m,0x{address:08x},0x{mask:08x}"),
        }
    }
}

impl FromStr for FaultToken {
    type Err = FaultcovError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FaultcovError::artifact(format!("invalid fault token {s:?}"));
        let mut parts = s.trim().split(',');
        let (Some(tag), Some(id), Some(mask), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(bad());
        };
        let id = parse_number(id).map_err(|_| bad())?;
        let mask = parse_number(mask).map_err(|_| bad())?;
        Ok(match tag {
            "g" => Self::Gpr { number: id, mask },
            "c" => Self::Csr { number: id, mask },
            "mcsr" => Self::DeviceCsr { index: id, mask },
            "i" => Self::Instruction {
                id: InstructionId(usize::try_from(id).map_err(|_| bad())?),
                mask,
            },
            "f" => Self::FetchRegister { mask },
            "m" => Self::CoreMemory { address: id, mask },
            _ => return Err(bad()),
        })
    }
}

impl Serialize for FaultToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FaultToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Every fault an architecture can suffer.
///
/// Register, instruction and fetch-register faults are held explicitly;
/// core memory is kept as byte ranges and expanded on demand.
#[derive(Debug, Clone)]
pub struct FaultUniverse {
    explicit: BTreeSet<FaultToken>,
    memory: Vec<(u64, u64)>,
    memory_masks: Vec<u64>,
}

impl FaultUniverse {
    /// Universe of `arch` under `space`; regions above `ceiling` bytes are
    /// left out
    #[must_use]
    pub fn build(arch: &ArchitectureModel, space: &FaultSpace, ceiling: u64) -> Self {
        let mut explicit = BTreeSet::new();
        for (number, masks) in space.gprs() {
            explicit.extend(masks.iter().map(|&mask| FaultToken::Gpr { number, mask }));
        }
        for (number, masks) in space.csrs() {
            explicit.extend(masks.iter().map(|&mask| FaultToken::Csr { number, mask }));
        }
        for (index, masks) in space.device_csrs() {
            explicit.extend(masks.iter().map(|&mask| FaultToken::DeviceCsr { index, mask }));
        }
        for (id, masks) in space.instructions() {
            explicit.extend(masks.iter().map(|&mask| FaultToken::Instruction { id, mask }));
        }
        explicit.extend(
            space
                .ifr_masks()
                .iter()
                .map(|&mask| FaultToken::FetchRegister { mask }),
        );

        let mut memory: Vec<(u64, u64)> = FaultSpace::core_regions(arch, ceiling)
            .map(|r| (r.from, r.to))
            .collect();
        memory.sort_unstable();

        Self {
            explicit,
            memory,
            memory_masks: space.coremem_masks().to_vec(),
        }
    }

    /// Total number of faults
    #[must_use]
    pub fn len(&self) -> u64 {
        self.explicit.len() as u64 + self.memory_len()
    }

    /// Whether the universe holds no fault
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn memory_len(&self) -> u64 {
        self.memory
            .iter()
            .map(|&(from, to)| to - from + 1)
            .sum::<u64>()
            .saturating_mul(self.memory_masks.len() as u64)
    }

    /// Whether `token` belongs to the universe
    #[must_use]
    pub fn contains(&self, token: &FaultToken) -> bool {
        match *token {
            FaultToken::CoreMemory { address, mask } => {
                self.memory_masks.contains(&mask)
                    && self
                        .memory
                        .iter()
                        .any(|&(from, to)| (from..=to).contains(&address))
            }
            _ => self.explicit.contains(token),
        }
    }

    /// Register, instruction and fetch-register faults
    #[must_use]
    pub const fn explicit_tokens(&self) -> &BTreeSet<FaultToken> {
        &self.explicit
    }

    /// Every fault, core memory expanded lazily
    pub fn iter(&self) -> impl Iterator<Item = FaultToken> + '_ {
        self.explicit.iter().copied().chain(
            self.memory
                .iter()
                .flat_map(|&(from, to)| from..=to)
                .flat_map(|address| {
                    self.memory_masks
                        .iter()
                        .map(move |&mask| FaultToken::CoreMemory { address, mask })
                }),
        )
    }

    /// Faults detected by none of `coverage`
    #[must_use]
    pub fn uncovered<'a, I>(&self, coverage: I) -> UncoveredFaults
    where
        I: IntoIterator<Item = &'a BTreeSet<FaultToken>>,
    {
        let mut tokens = self.explicit.clone();
        let mut covered_memory = BTreeSet::new();
        for set in coverage {
            for token in set {
                match token {
                    FaultToken::CoreMemory { .. } => {
                        if self.contains(token) {
                            covered_memory.insert(*token);
                        }
                    }
                    _ => {
                        tokens.remove(token);
                    }
                }
            }
        }

        let mut out = UncoveredFaults {
            memory_faults: self.memory_len() - covered_memory.len() as u64,
            ..UncoveredFaults::default()
        };
        for token in &tokens {
            match *token {
                FaultToken::Gpr { number, .. } => {
                    out.gprs.insert(number);
                }
                FaultToken::Csr { number, .. } => {
                    out.csrs.insert(number);
                }
                FaultToken::DeviceCsr { index, .. } => {
                    out.device_csrs.insert(index);
                }
                FaultToken::Instruction { id, .. } => {
                    out.instructions.insert(id);
                }
                FaultToken::FetchRegister { .. } | FaultToken::CoreMemory { .. } => {}
            }
        }
        out.tokens = tokens;
        out
    }
}

/// Result of [`FaultUniverse::uncovered`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UncoveredFaults {
    /// Uncovered register, instruction and fetch-register faults
    pub tokens: BTreeSet<FaultToken>,
    /// Number of uncovered core-memory faults
    pub memory_faults: u64,
    /// GPRs with at least one uncovered fault
    pub gprs: BTreeSet<u64>,
    /// CSRs with at least one uncovered fault
    pub csrs: BTreeSet<u64>,
    /// Device CSRs with at least one uncovered fault
    pub device_csrs: BTreeSet<u64>,
    /// Instructions with at least one uncovered fault
    pub instructions: BTreeSet<InstructionId>,
}

impl UncoveredFaults {
    /// Total number of uncovered faults
    #[must_use]
    pub fn len(&self) -> u64 {
        self.tokens.len() as u64 + self.memory_faults
    }

    /// Whether everything is covered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a newline-separated token list
pub fn parse_tokens(text: &str) -> FaultcovResult<BTreeSet<FaultToken>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::parse)
        .collect()
}
