//! Property tests for fault enumeration and set cover.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use faultcov::{
    binomial, enumerate, enumeration_size, greedy_cover, restrict_to_mask, weighted_cover,
    ArchitectureModel, FaultSpace,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const CATALOG: &str = r"
name: props
subsets: [I]
limits: { imem: 2 }
operands:
  - { name: rd, short_name: rd, mask: 0xF80, type: gpr }
  - { name: imm12, short_name: imm, mask: 0xFFF00000, type: imm }
instructions:
  - { name: lui, subset: I, mask: 0x7F, opcode: 0x37, operands: [rd] }
  - { name: addi, subset: I, mask: 0x707F, opcode: 0x13, operands: [rd, imm12] }
";

fn sets() -> impl Strategy<Value = Vec<BTreeSet<u8>>> {
    prop::collection::vec(prop::collection::btree_set(0u8..24, 0..8), 0..10)
}

fn union(sets: &[BTreeSet<u8>]) -> BTreeSet<u8> {
    sets.iter().flatten().copied().collect()
}

proptest! {
    #[test]
    fn prop_enumeration_size_matches_binomials(bits in 1u32..=16, limit in 1u32..=3) {
        let masks = enumerate(bits, limit);
        let expected: u64 = (1..=limit).map(|k| binomial(bits, k)).sum();
        prop_assert_eq!(masks.len() as u64, expected);
        prop_assert_eq!(enumeration_size(bits, limit), expected);
    }

    #[test]
    fn prop_enumeration_sorted_unique_bounded(bits in 1u32..=20, limit in 1u32..=2) {
        let masks = enumerate(bits, limit);
        prop_assert!(masks.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(masks.iter().all(|&m| m != 0 && m < (1u64 << bits)));
        prop_assert!(masks.iter().all(|&m| m.count_ones() <= limit));
    }

    #[test]
    fn prop_restriction_stays_inside_mask(mask in any::<u32>()) {
        let faults = enumerate(32, 2);
        let restricted = restrict_to_mask(&faults, u64::from(mask));
        prop_assert!(restricted.iter().all(|&m| m != 0 && m & !u64::from(mask) == 0));
    }

    #[test]
    fn prop_greedy_covers_union(sets in sets()) {
        let picked = greedy_cover(&sets);
        let covered: BTreeSet<u8> = picked.iter().flat_map(|&i| sets[i].iter().copied()).collect();
        prop_assert_eq!(covered, union(&sets));
        let unique: BTreeSet<_> = picked.iter().collect();
        prop_assert_eq!(unique.len(), picked.len());
    }

    #[test]
    fn prop_weighted_covers_union(
        sets in sets(),
        weights in prop::collection::vec(0.0f64..100.0, 10)
    ) {
        let selection = weighted_cover(&sets, &weights);
        let covered: BTreeSet<u8> = selection
            .selected
            .iter()
            .flat_map(|&i| sets[i].iter().copied())
            .collect();
        prop_assert_eq!(covered, union(&sets));
        let cost: f64 = selection.selected.iter().map(|&i| weights[i]).sum();
        prop_assert!((cost - selection.cost).abs() < 1e-6);
    }

    #[test]
    fn prop_weighted_selection_never_redundant_on_pick(sets in sets()) {
        // every pick adds at least one new element when made
        let weights = vec![1.0; sets.len()];
        let selection = weighted_cover(&sets, &weights);
        let mut covered = BTreeSet::new();
        for &i in &selection.selected {
            let before = covered.len();
            covered.extend(sets[i].iter().copied());
            prop_assert!(covered.len() > before);
        }
    }
}

#[test]
fn test_instruction_masks_inside_relevant_bits() {
    let arch = ArchitectureModel::from_yaml(CATALOG).unwrap();
    let space = FaultSpace::naive(&arch);
    for def in arch.instructions() {
        let relevant = def.relevant_mask();
        let masks = space.instruction_masks(def.id).unwrap();
        assert!(!masks.is_empty());
        assert!(masks.iter().all(|&m| m != 0 && m & !relevant == 0));
        assert!(masks.iter().all(|&m| m.count_ones() <= 2));
    }
}
