//! Property-based tests for allocation and layout

use ffs_pack::{
    allocation_size, grown_size, HeaderManifest, ImageBuffer, InputFile, LayoutEngine, LoadScript,
    Outputs, PackError, PartitionRecord, PartitionTable, RuleSet,
};
use proptest::prelude::*;
use std::path::Path;

const MAIN_SIZE: u64 = 0x40000;

fn table() -> PartitionTable {
    PartitionTable::from_records(vec![
        PartitionRecord::new("ffs", 0x01, 0x82, 0x310000, MAIN_SIZE),
        PartitionRecord::new("storage", 0x01, 0x81, 0x350000, 0x80000),
    ])
    .unwrap()
}

fn outputs() -> Outputs<HeaderManifest, LoadScript, ImageBuffer> {
    let main = PartitionRecord::new("ffs", 0x01, 0x82, 0x310000, MAIN_SIZE);
    Outputs {
        manifest: HeaderManifest::new(),
        script: LoadScript::new(),
        image: ImageBuffer::new(&main).unwrap(),
    }
}

fn files_from(lengths: &[usize]) -> Vec<InputFile> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, len)| InputFile::from_bytes(format!("f{:03}.dat", i), vec![0x5A; *len]))
        .collect()
}

proptest! {
    #[test]
    fn prop_allocation_is_smallest_covering_multiple(
        len in 0u64..1_000_000,
        quantum in 1u64..70_000,
    ) {
        let alloc = allocation_size(len, quantum);
        prop_assert_eq!(alloc % quantum, 0);
        prop_assert!(alloc >= len.max(1));
        prop_assert!(alloc - quantum < len.max(1));
    }

    #[test]
    fn prop_growth_quantum_always_adds_headroom(
        len in 0u64..1_000_000,
        quantum in 1u64..70_000,
    ) {
        let alloc = grown_size(len, quantum);
        prop_assert_eq!(alloc % quantum, 0);
        prop_assert!(alloc > len);
        prop_assert_eq!(alloc, (len / quantum + 1) * quantum);
    }

    #[test]
    fn prop_main_offsets_are_contiguous(lengths in prop::collection::vec(0usize..9000, 1..20)) {
        let files = files_from(&lengths);
        let rules = RuleSet::new();
        let table = table();
        let engine = LayoutEngine::new(&table, &rules, "ffs", 4096).unwrap();

        let mut out = outputs();
        match engine.run(&files, &mut out, Path::new("ffs.bin")) {
            Ok(summary) => {
                let mut expected = 0;
                for entry in &summary.entries {
                    prop_assert_eq!(entry.offset, expected);
                    prop_assert_eq!(entry.allocated % 4096, 0);
                    prop_assert!(entry.allocated >= entry.length.max(1));
                    expected += entry.allocated;
                }
                prop_assert_eq!(summary.used, expected);
                prop_assert!(summary.used <= MAIN_SIZE);
            }
            Err(PackError::PartitionOverflow { partition, .. }) => {
                let total: u64 = lengths
                    .iter()
                    .map(|len| allocation_size(*len as u64, 4096))
                    .sum();
                prop_assert_eq!(partition, "ffs");
                prop_assert!(total > MAIN_SIZE);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn prop_redirected_files_leave_cursor_alone(
        lengths in prop::collection::vec(1usize..4000, 1..12),
        redirect in prop::collection::vec(any::<bool>(), 12),
    ) {
        let files: Vec<InputFile> = lengths
            .iter()
            .enumerate()
            .map(|(i, len)| {
                let ext = if redirect[i] { "bin" } else { "txt" };
                InputFile::from_bytes(format!("f{:03}.{}", i, ext), vec![1; *len])
            })
            .collect();

        let rules = RuleSet::parse_args(&["*.bin=p:storage"]).unwrap();
        let table = table();
        let engine = LayoutEngine::new(&table, &rules, "ffs", 4096).unwrap();
        let mut out = outputs();
        let redirected = redirect[..lengths.len()].iter().filter(|r| **r).count();

        match engine.run(&files, &mut out, Path::new("ffs.bin")) {
            Ok(summary) => {
                // A single redirected file at offset 0 is the only one that fits
                prop_assert!(redirected <= 1);
                let in_main = summary.entries.iter().filter(|e| e.embedded).count() as u64;
                prop_assert_eq!(summary.used, in_main * 4096);
                for entry in summary.entries.iter().filter(|e| !e.embedded) {
                    prop_assert_eq!(entry.partition.as_deref(), Some("storage"));
                    prop_assert_eq!(entry.offset, 0);
                }
            }
            Err(PackError::RegionOverlap { partition, .. }) => {
                prop_assert!(redirected >= 2);
                prop_assert_eq!(partition, "storage");
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn prop_first_matching_rule_wins(name in "[a-z]{1,8}") {
        let path = format!("{}.bin", name);
        let rules = RuleSet::parse_args(&[
            format!("{}=p:storage", path),
            "*.bin=p:ffs".to_string(),
        ])
        .unwrap();

        let rule = rules.first_match(&path).unwrap();
        prop_assert_eq!(rule.partition.as_deref(), Some("storage"));
    }
}
