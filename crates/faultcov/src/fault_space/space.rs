use super::restriction::{instruction_key, FaultOverride, FaultRestrictionSource, NaiveEnumeration};
use super::StructureKind;
use crate::catalog::{ArchitectureModel, FaultLimits, InstructionId, MemoryRegion};
use crate::result::FaultcovResult;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Largest memory region whose bytes are enumerated (32 MiB)
pub const DEFAULT_REGION_CEILING: u64 = 32 * 1024 * 1024;

/// Legal fault masks of every structure of one architecture.
///
/// Built once and shared read-only by mutant generation, fault-edge
/// construction and universe computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSpace {
    limits: FaultLimits,
    gpr: BTreeMap<u64, Vec<u64>>,
    csr: BTreeMap<u64, Vec<u64>>,
    device_csr: BTreeMap<u64, Vec<u64>>,
    instruction: BTreeMap<InstructionId, Vec<u64>>,
    ifr: Vec<u64>,
    coremem: Vec<u64>,
}

impl FaultSpace {
    /// Fault space from the catalog alone
    #[must_use]
    pub fn naive(arch: &ArchitectureModel) -> Self {
        let naive = NaiveEnumeration::new(arch);
        Self::build(arch, &naive, &naive)
    }

    /// Fault space with `source` consulted before the naive enumeration
    #[must_use]
    pub fn with_source(arch: &ArchitectureModel, source: &dyn FaultRestrictionSource) -> Self {
        Self::build(arch, source, &NaiveEnumeration::new(arch))
    }

    /// Fault space honouring the catalog's override document, if any
    pub fn for_architecture(arch: &ArchitectureModel) -> FaultcovResult<Self> {
        match arch.fault_override_path() {
            Some(path) => {
                let source = FaultOverride::load(path, arch.limits())?;
                debug!(path = %path.display(), structures = source.len(), "using fault override");
                Ok(Self::with_source(arch, &source))
            }
            None => Ok(Self::naive(arch)),
        }
    }

    fn build(
        arch: &ArchitectureModel,
        source: &dyn FaultRestrictionSource,
        naive: &NaiveEnumeration,
    ) -> Self {
        let collect = |kind: StructureKind| -> BTreeMap<u64, Vec<u64>> {
            let ids = source
                .structure_ids(kind)
                .or_else(|| naive.structure_ids(kind))
                .unwrap_or_default();
            ids.into_iter()
                .filter_map(|id| {
                    source
                        .legal_masks(kind, id)
                        .or_else(|| naive.legal_masks(kind, id))
                        .map(|masks| (id, masks.into_iter().collect()))
                })
                .collect()
        };
        let single = |kind: StructureKind| -> Vec<u64> {
            source
                .legal_masks(kind, 0)
                .or_else(|| naive.legal_masks(kind, 0))
                .map(|m| m.into_iter().collect())
                .unwrap_or_default()
        };

        let instruction = arch
            .instructions()
            .iter()
            .filter_map(|def| {
                let key = instruction_key(def.id);
                source
                    .legal_masks(StructureKind::InstructionMemory, key)
                    .or_else(|| naive.legal_masks(StructureKind::InstructionMemory, key))
                    .map(|masks| (def.id, masks.into_iter().collect()))
            })
            .collect();

        Self {
            limits: arch.limits(),
            gpr: collect(StructureKind::Gpr),
            csr: collect(StructureKind::Csr),
            device_csr: collect(StructureKind::DeviceCsr),
            instruction,
            ifr: single(StructureKind::InstructionFetchRegister),
            coremem: single(StructureKind::CoreMemory),
        }
    }

    /// Limits the space was built with
    #[must_use]
    pub const fn limits(&self) -> FaultLimits {
        self.limits
    }

    /// Legal masks of a GPR; `None` if the register is not faultable
    #[must_use]
    pub fn gpr_masks(&self, number: u64) -> Option<&[u64]> {
        self.gpr.get(&number).map(Vec::as_slice)
    }

    /// Legal masks of a CSR; `None` if the register is not faultable
    #[must_use]
    pub fn csr_masks(&self, number: u64) -> Option<&[u64]> {
        self.csr.get(&number).map(Vec::as_slice)
    }

    /// Legal masks of a device CSR by catalog index
    #[must_use]
    pub fn device_csr_masks(&self, index: u64) -> Option<&[u64]> {
        self.device_csr.get(&index).map(Vec::as_slice)
    }

    /// Legal instruction-memory masks of an instruction
    #[must_use]
    pub fn instruction_masks(&self, id: InstructionId) -> Option<&[u64]> {
        self.instruction.get(&id).map(Vec::as_slice)
    }

    /// Masks of the 32-bit instruction-fetch register
    #[must_use]
    pub fn ifr_masks(&self) -> &[u64] {
        &self.ifr
    }

    /// Masks of one core-memory byte
    #[must_use]
    pub fn coremem_masks(&self) -> &[u64] {
        &self.coremem
    }

    /// Faultable GPRs with their masks
    pub fn gprs(&self) -> impl Iterator<Item = (u64, &[u64])> {
        self.gpr.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Faultable CSRs with their masks
    pub fn csrs(&self) -> impl Iterator<Item = (u64, &[u64])> {
        self.csr.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Faultable device CSRs with their masks
    pub fn device_csrs(&self) -> impl Iterator<Item = (u64, &[u64])> {
        self.device_csr.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Instructions with their masks
    pub fn instructions(&self) -> impl Iterator<Item = (InstructionId, &[u64])> {
        self.instruction.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Core-memory regions whose bytes are enumerated.
    ///
    /// Device regions are excluded. Regions larger than `ceiling` bytes are
    /// skipped with a warning.
    pub fn core_regions<'a>(
        arch: &'a ArchitectureModel,
        ceiling: u64,
    ) -> impl Iterator<Item = &'a MemoryRegion> + 'a {
        arch.memory_regions()
            .iter()
            .filter(|r| r.device.is_none())
            .filter(move |r| {
                let fits = r.size() <= ceiling;
                if !fits {
                    warn!(
                        region = %r.name,
                        size = r.size(),
                        ceiling,
                        "memory region too large, skipping"
                    );
                }
                fits
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::{sample, RV32_SAMPLE};
    use crate::fault_space::enumerate;

    mod naive_space_tests {
        use super::*;

        #[test]
        fn test_gpr_space() {
            let space = FaultSpace::naive(&sample());
            assert_eq!(space.gpr_masks(10).unwrap(), enumerate(32, 1).as_slice());
            assert!(space.gpr_masks(0).is_none());
            assert_eq!(space.gprs().count(), 6);
        }

        #[test]
        fn test_csr_space_restricted() {
            let space = FaultSpace::naive(&sample());
            assert_eq!(space.csr_masks(0x300).unwrap(), &[0x08, 0x80]);
            assert_eq!(space.csr_masks(0xF14).unwrap().len(), 32);
        }

        #[test]
        fn test_instruction_masks_inside_relevant_bits() {
            let arch = sample();
            let space = FaultSpace::naive(&arch);
            for def in arch.instructions() {
                let masks = space.instruction_masks(def.id).unwrap();
                let relevant = def.relevant_mask();
                assert!(masks.iter().all(|&m| m != 0 && m & !relevant == 0));
            }
        }

        #[test]
        fn test_ifr_and_coremem() {
            let space = FaultSpace::naive(&sample());
            assert_eq!(space.ifr_masks().len(), 32);
            assert_eq!(space.coremem_masks(), &[1, 2, 4, 8, 16, 32, 64, 128]);
        }

        #[test]
        fn test_mret_has_single_bit_masks() {
            let arch = sample();
            let space = FaultSpace::naive(&arch);
            let mret = arch.decode(0x3020_0073).unwrap();
            assert_eq!(space.instruction_masks(mret.id).unwrap().len(), 32);
        }
    }

    mod override_space_tests {
        use super::*;

        #[test]
        fn test_override_replaces_gpr_and_csr_only() {
            let arch = sample();
            let ov = FaultOverride::from_yaml(
                "gprs:\n  5: [1, 2]\ncsrs:\n  \"300\": [8]\n",
                arch.limits(),
            )
            .unwrap();
            let space = FaultSpace::with_source(&arch, &ov);
            assert_eq!(space.gprs().count(), 1);
            assert_eq!(space.gpr_masks(5).unwrap(), &[1, 2]);
            assert!(space.gpr_masks(10).is_none());
            assert_eq!(space.csr_masks(0x300).unwrap(), &[8]);
            assert!(space.csr_masks(0xF14).is_none());
            assert_eq!(space.ifr_masks().len(), 32);
        }

        #[test]
        fn test_for_architecture_reads_override_file() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("cla.yaml"), "gprs:\n  1: [4]\n").unwrap();
            let catalog = format!("{RV32_SAMPLE}\nfault_override: cla.yaml\n");
            let path = dir.path().join("arch.yaml");
            std::fs::write(&path, catalog).unwrap();
            let arch = ArchitectureModel::load(&path).unwrap();
            let space = FaultSpace::for_architecture(&arch).unwrap();
            assert_eq!(space.gpr_masks(1).unwrap(), &[4]);
        }
    }

    #[test]
    fn test_core_regions_skip_devices_and_oversized() {
        let arch = sample();
        let names: Vec<_> = FaultSpace::core_regions(&arch, DEFAULT_REGION_CEILING)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["ram", "rom"]);
        let small: Vec<_> = FaultSpace::core_regions(&arch, 0x1000).map(|r| r.name.as_str()).collect();
        assert_eq!(small, vec!["rom"]);
    }
}
