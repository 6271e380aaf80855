//! Golden-run trace decoding.
//!
//! A trace mixes disassembly lines with structured summary lines:
//!
//! ```text
//! 0x80000000:  00000513          addi            a0,zero,0
//! GPR[10]:0,1,1
//! CSR[768]:2,1,3
//! MEM_32[80001000]:1,1,2
//! EXE[80000000]:1
//! ```
//!
//! [`TraceDecoder`] turns it into a [`DecodedTrace`]: the decoded instruction
//! per address, access summaries per register and memory location, and
//! execution statistics per instruction definition.

mod decoder;
mod lines;

pub use decoder::{DecodedInstruction, DecodedTrace, RegisterClassification, TraceDecoder};
pub use lines::{parse_encoding, parse_line, InstructionLine, RegisterFile, TraceLine};

use serde::{Deserialize, Serialize};

/// Read/write counts of one register or memory location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessSummary {
    /// Number of reads
    pub reads: u64,
    /// Number of writes
    pub writes: u64,
    /// `reads + writes`
    pub total: u64,
}

impl AccessSummary {
    /// Summary with `total = reads + writes`
    #[must_use]
    pub const fn new(reads: u64, writes: u64) -> Self {
        Self {
            reads,
            writes,
            total: reads.saturating_add(writes),
        }
    }

    /// Whether the location was written at least once
    #[must_use]
    pub const fn is_written(&self) -> bool {
        self.writes > 0
    }

    /// Whether the location was accessed at all
    #[must_use]
    pub const fn is_accessed(&self) -> bool {
        self.total > 0
    }
}
