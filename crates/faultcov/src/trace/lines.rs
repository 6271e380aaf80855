//! Line grammar of golden-run trace artifacts.

use super::AccessSummary;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

#[allow(clippy::expect_used)]
static RE_INSTRUCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:0x)?(?P<address>[0-9a-fA-F]{8}):\s+(?P<encoding>\S+)\s+(?P<mnemonic>\S+)\s*(?P<ops>[\w,()-]+)?",
    )
    .expect("instruction pattern is a literal")
});

#[allow(clippy::expect_used)]
static RE_REGISTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:-?[0-9]+\()?(?P<reg>[^-\d][^,\s()]+)\)?$")
        .expect("register pattern is a literal")
});

#[allow(clippy::expect_used)]
static RE_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<kind>GPR|CSR)\[(?P<idx>\d+)\]:(?P<read>\d+),(?P<write>\d+),(?P<total>\d+)$",
    )
    .expect("summary pattern is a literal")
});

#[allow(clippy::expect_used)]
static RE_MEMORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^MEM_(?P<width>8|16|32)\[(?P<loc>[0-9a-fA-F]+)\]:(?P<read>\d+),(?P<write>\d+),(?P<total>\d+)$",
    )
    .expect("memory pattern is a literal")
});

#[allow(clippy::expect_used)]
static RE_EXECUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^EXE\[(?P<pc>[0-9a-fA-F]+)\]:(?P<total>\d+)$")
        .expect("execution pattern is a literal")
});

/// Disassembly line `ADDR: ENCODING MNEMONIC OPERANDS # comment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLine<'a> {
    /// Program counter
    pub address: u64,
    /// Raw encoding text as printed
    pub encoding: &'a str,
    /// Encoded instruction word
    pub word: u64,
    /// Printed mnemonic
    pub mnemonic: &'a str,
    /// Operand text, if any
    pub operands: Option<&'a str>,
}

impl InstructionLine<'_> {
    /// Register names referenced by the operand text (`8(sp)` yields `sp`)
    pub fn registers(&self) -> impl Iterator<Item = &str> + '_ {
        self.operands
            .into_iter()
            .flat_map(|ops| ops.split([',', '(', ')']))
            .filter(|tok| !tok.is_empty())
            .filter_map(|tok| {
                RE_REGISTER
                    .captures(tok)
                    .and_then(|c| c.name("reg"))
                    .map(|m| m.as_str())
            })
    }
}

/// Structured register summary kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFile {
    /// `GPR[idx]`
    Gpr,
    /// `CSR[idx]`
    Csr,
}

/// One recognised trace line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine<'a> {
    /// Disassembly
    Instruction(InstructionLine<'a>),
    /// `GPR[idx]:r,w,t` or `CSR[idx]:r,w,t`
    Register {
        /// Register file
        file: RegisterFile,
        /// Register number
        index: u64,
        /// Access counts
        summary: AccessSummary,
    },
    /// `MEM_<width>[addr]:r,w,t`
    Memory {
        /// Access width in bytes (1, 2 or 4)
        size: u8,
        /// First byte address
        address: u64,
        /// Access counts
        summary: AccessSummary,
    },
    /// `EXE[pc]:total`
    Execution {
        /// Program counter
        pc: u64,
        /// Times executed
        count: u64,
    },
}

/// Classify one trace line; `None` for free-form or malformed content
pub fn parse_line(line: &str) -> Option<TraceLine<'_>> {
    let line = line.trim_end();
    if let Some(c) = RE_INSTRUCTION.captures(line) {
        let address = u64::from_str_radix(c.name("address")?.as_str(), 16).ok()?;
        let encoding = c.name("encoding")?.as_str();
        let word = parse_encoding(encoding)?;
        return Some(TraceLine::Instruction(InstructionLine {
            address,
            encoding,
            word,
            mnemonic: c.name("mnemonic")?.as_str(),
            operands: c.name("ops").map(|m| m.as_str()),
        }));
    }
    if let Some(c) = RE_SUMMARY.captures(line) {
        let file = match c.name("kind")?.as_str() {
            "GPR" => RegisterFile::Gpr,
            _ => RegisterFile::Csr,
        };
        return Some(TraceLine::Register {
            file,
            index: c.name("idx")?.as_str().parse().ok()?,
            summary: summary_from(&c)?,
        });
    }
    if let Some(c) = RE_MEMORY.captures(line) {
        let size = match c.name("width")?.as_str() {
            "8" => 1,
            "16" => 2,
            _ => 4,
        };
        return Some(TraceLine::Memory {
            size,
            address: u64::from_str_radix(c.name("loc")?.as_str(), 16).ok()?,
            summary: summary_from(&c)?,
        });
    }
    if let Some(c) = RE_EXECUTION.captures(line) {
        return Some(TraceLine::Execution {
            pc: u64::from_str_radix(c.name("pc")?.as_str(), 16).ok()?,
            count: c.name("total")?.as_str().parse().ok()?,
        });
    }
    None
}

/// Assemble the printed encoding into an instruction word.
///
/// Space-separated byte groups are printed least significant first and are
/// reversed before joining.
pub fn parse_encoding(text: &str) -> Option<u64> {
    let joined: String = text.split_whitespace().rev().collect();
    let joined = joined.strip_prefix("0x").unwrap_or(&joined);
    if joined.is_empty() || joined.len() > 16 {
        return None;
    }
    u64::from_str_radix(joined, 16).ok()
}

/// The printed total is checked but never trusted: `total` is always
/// `reads + writes`.
fn summary_from(c: &regex::Captures<'_>) -> Option<AccessSummary> {
    let reads = c.name("read")?.as_str().parse().ok()?;
    let writes = c.name("write")?.as_str().parse().ok()?;
    let printed: u64 = c.name("total")?.as_str().parse().ok()?;
    let summary = AccessSummary::new(reads, writes);
    if printed != summary.total {
        warn!(
            line = c.get(0).map_or("", |m| m.as_str()),
            printed,
            "access total is not reads + writes"
        );
    }
    Some(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod instruction_line_tests {
        use super::*;

        #[test]
        fn test_parse_disassembly_line() {
            let line = "0x00001004:  02828613          addi            a2,t0,40";
            let Some(TraceLine::Instruction(insn)) = parse_line(line) else {
                panic!("expected instruction line");
            };
            assert_eq!(insn.address, 0x1004);
            assert_eq!(insn.word, 0x0282_8613);
            assert_eq!(insn.mnemonic, "addi");
            assert_eq!(insn.operands, Some("a2,t0,40"));
        }

        #[test]
        fn test_parse_without_prefix_and_comment() {
            let line = "80000010:  30200073  mret   # return";
            let Some(TraceLine::Instruction(insn)) = parse_line(line) else {
                panic!("expected instruction line");
            };
            assert_eq!(insn.address, 0x8000_0010);
            assert_eq!(insn.mnemonic, "mret");
            assert_eq!(insn.operands, None);
        }

        #[test]
        fn test_registers_strip_displacement() {
            let line = "0x80000000:  0202a583  lw  a1,32(t0)";
            let Some(TraceLine::Instruction(insn)) = parse_line(line) else {
                panic!("expected instruction line");
            };
            let regs: Vec<_> = insn.registers().collect();
            assert_eq!(regs, vec!["a1", "t0"]);
        }

        #[test]
        fn test_registers_skip_immediates() {
            let line = "0x80000000:  ff010113  addi  sp,sp,-16";
            let Some(TraceLine::Instruction(insn)) = parse_line(line) else {
                panic!("expected instruction line");
            };
            let regs: Vec<_> = insn.registers().collect();
            assert_eq!(regs, vec!["sp", "sp"]);
        }

        #[test]
        fn test_non_hex_encoding_ignored() {
            assert_eq!(parse_line("0x80000000:  zzzz  addi a0,a0,1"), None);
        }
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_gpr_summary() {
            assert_eq!(
                parse_line("GPR[10]:3,2,5"),
                Some(TraceLine::Register {
                    file: RegisterFile::Gpr,
                    index: 10,
                    summary: AccessSummary::new(3, 2)
                })
            );
        }

        #[test]
        fn test_total_recomputed_from_reads_and_writes() {
            let Some(TraceLine::Register { summary, .. }) = parse_line("GPR[5]:1,2,9") else {
                panic!("expected register line");
            };
            assert_eq!(summary, AccessSummary::new(1, 2));
            assert_eq!(summary.total, 3);
        }

        #[test]
        fn test_csr_summary() {
            let Some(TraceLine::Register { file, index, .. }) = parse_line("CSR[768]:1,1,2") else {
                panic!("expected register line");
            };
            assert_eq!(file, RegisterFile::Csr);
            assert_eq!(index, 768);
        }

        #[test]
        fn test_memory_widths() {
            for (text, size) in [("MEM_8[80000000]:1,0,1", 1), ("MEM_16[80000000]:1,0,1", 2), ("MEM_32[80000000]:1,0,1", 4)] {
                let Some(TraceLine::Memory { size: s, address, .. }) = parse_line(text) else {
                    panic!("expected memory line for {text}");
                };
                assert_eq!(s, size);
                assert_eq!(address, 0x8000_0000);
            }
        }

        #[test]
        fn test_execution_line() {
            assert_eq!(
                parse_line("EXE[80000004]:17"),
                Some(TraceLine::Execution { pc: 0x8000_0004, count: 17 })
            );
        }

        #[test]
        fn test_free_form_ignored() {
            assert_eq!(parse_line("Golden run finished"), None);
            assert_eq!(parse_line("GPR[x]:1,2,3"), None);
            assert_eq!(parse_line(""), None);
        }
    }

    #[test]
    fn test_parse_encoding_byte_groups() {
        assert_eq!(parse_encoding("13 05 00 00"), Some(0x0000_0513));
        assert_eq!(parse_encoding("00000513"), Some(0x513));
        assert_eq!(parse_encoding(""), None);
    }
}
