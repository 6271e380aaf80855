//! Command handlers
//!
//! Each handler module holds the execution logic of one subcommand plus the
//! pure helpers it renders with, so both can be tested without the binary.

pub mod cover;
pub mod decode;
pub mod faults;
pub mod mutants;
pub mod simulate;
pub mod validate;

pub use cover::{execute_cover, load_programs};
pub use decode::execute_decode;
pub use faults::execute_faults;
pub use mutants::execute_mutants;
pub use simulate::execute_simulate;
pub use validate::execute_validate;

use crate::error::{CliError, CliResult};
use faultcov::{ArchitectureModel, DecodedTrace, TraceDecoder};
use std::path::Path;

/// Load a catalog; failure is fatal for every command
pub fn load_architecture(path: &Path) -> CliResult<ArchitectureModel> {
    if !path.is_file() {
        return Err(CliError::invalid_argument(format!(
            "catalog {} does not exist",
            path.display()
        )));
    }
    Ok(ArchitectureModel::load(path)?)
}

/// Decode a trace file against `arch`
pub fn load_trace(arch: &ArchitectureModel, path: &Path) -> CliResult<DecodedTrace> {
    if !path.is_file() {
        return Err(CliError::invalid_argument(format!(
            "trace {} does not exist",
            path.display()
        )));
    }
    Ok(TraceDecoder::new(arch).decode_file(path)?)
}

/// Program name derived from a file path
#[must_use]
pub fn program_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "program".to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) mod fixtures {
    //! Catalog and trace shared by the handler tests

    use std::path::{Path, PathBuf};

    pub const CATALOG: &str = r"
name: fixture
subsets: [I, Zicsr]
gprs:
  - { name: x0, abi_name: zero, number: 0 }
  - { name: x10, abi_name: a0, number: 10 }
  - { name: x11, abi_name: a1, number: 11 }
csrs:
  - { name: mstatus, number: 0x300, access: RW, mask: 0x88 }
operands:
  - { name: rd, short_name: rd, mask: 0xF80, type: gpr }
  - { name: rs1, short_name: rs1, mask: 0xF8000, type: gpr }
  - { name: imm12, short_name: imm, mask: 0xFFF00000, type: imm }
  - { name: csr, short_name: csr, mask: 0xFFF00000, type: csr }
instructions:
  - { name: addi, subset: I, mask: 0x707F, opcode: 0x13, kind: arith, operands: [rd, rs1, imm12] }
  - { name: lw, subset: I, mask: 0x707F, opcode: 0x2003, kind: load, operands: [rd, rs1, imm12] }
  - { name: csrrs, subset: Zicsr, mask: 0x707F, opcode: 0x2073, kind: csr, operands: [rd, rs1, csr] }
memory_regions:
  - { name: ram, from: 0x80000000, to: 0x80000FFF, type: RAM }
";

    pub const TRACE: &str = "\
0x80000000:  00000513          addi            a0,zero,0
0x80000004:  30002573          csrrs           a0,mstatus,zero
GPR[10]:1,2,3
CSR[768]:1,1,2
MEM_8[80000010]:1,1,2
EXE[80000000]:3
EXE[80000004]:1
";

    /// Write the fixture catalog and trace into `dir`
    pub fn write(dir: &Path) -> (PathBuf, PathBuf) {
        let arch = dir.join("arch.yaml");
        let trace = dir.join("prog.lst");
        std::fs::write(&arch, CATALOG).expect("write catalog");
        std::fs::write(&trace, TRACE).expect("write trace");
        (arch, trace)
    }
}
