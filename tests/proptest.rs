use std::collections::HashSet;
use std::io::Cursor;

use compare_genotypes::{
    Pairing, VariantKey, compare_records, normalize_genotype, reconcile,
    record::{Reader, parse_record},
};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = VariantKey> {
    (
        prop::sample::select(vec!["1", "2", "X"]),
        1u32..40,
        prop::sample::select(vec!["A", "C", "G", "T"]),
        prop::sample::select(vec!["A", "C", "G", "T"]),
    )
        .prop_map(|(chrom, pos, r, a)| VariantKey::new(chrom, pos.to_string(), r, a))
}

fn genotype_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec!["0", "1", ".", "2"]).prop_map(String::from),
        (
            prop::sample::select(vec!["0", "1", "2", "."]),
            prop::sample::select(vec!["/", "|"]),
            prop::sample::select(vec!["0", "1", "2", "."]),
        )
            .prop_map(|(a, sep, b)| format!("{a}{sep}{b}")),
    ]
}

proptest! {
    #[test]
    fn set_partition_laws(
        first in prop::collection::vec(key_strategy(), 0..60),
        second in prop::collection::vec(key_strategy(), 0..60),
    ) {
        let a: HashSet<VariantKey> = first.iter().cloned().collect();
        let b: HashSet<VariantKey> = second.iter().cloned().collect();
        let result = reconcile(first, second);

        let only_first: HashSet<_> = result.only_first.iter().cloned().collect();
        let only_second: HashSet<_> = result.only_second.iter().cloned().collect();
        let shared: HashSet<_> = result.shared.iter().cloned().collect();

        prop_assert!(only_first.is_disjoint(&only_second));
        prop_assert_eq!(&shared, &a.intersection(&b).cloned().collect::<HashSet<_>>());
        prop_assert_eq!(&only_first.union(&shared).cloned().collect::<HashSet<_>>(), &a);
        prop_assert_eq!(&only_second.union(&shared).cloned().collect::<HashSet<_>>(), &b);

        let mut sorted = result.shared.clone();
        sorted.sort();
        prop_assert_eq!(sorted, result.shared);
    }

    #[test]
    fn normalization_is_idempotent(gt in genotype_strategy()) {
        let once = normalize_genotype(&gt).into_owned();
        let twice = normalize_genotype(&once).into_owned();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn heterozygous_order_and_phase_do_not_matter(
        sep_a in prop::sample::select(vec!["/", "|"]),
        sep_b in prop::sample::select(vec!["/", "|"]),
    ) {
        let left = normalize_genotype(&format!("0{sep_a}1")).into_owned();
        let right = normalize_genotype(&format!("1{sep_b}0")).into_owned();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn classification_partitions_rows(
        rows in prop::collection::vec(
            (
                prop::sample::select(vec!["A", "C"]),
                prop::sample::select(vec!["A", "C"]),
                genotype_strategy(),
                genotype_strategy(),
            ),
            0..40,
        ),
    ) {
        let mut array = Vec::new();
        let mut wgs = Vec::new();
        for (i, (alt_a, alt_b, gt_a, gt_b)) in rows.iter().enumerate() {
            let pos = i + 1;
            array.push(parse_record(&format!("1\t{pos}\t.\tG\t{alt_a}\t.\t.\t.\tGT\t{gt_a}")).unwrap());
            wgs.push(parse_record(&format!("1\t{pos}\t.\tG\t{alt_b}\t.\t.\t.\tGT\t{gt_b}")).unwrap());
        }

        for pairing in [Pairing::RowOrder, Pairing::Position] {
            let result = compare_records(&array, &wgs, pairing);
            prop_assert_eq!(result.compared, rows.len());
            prop_assert_eq!(
                result.concordant + result.ref_alt_mismatches.len() + result.discordances.len(),
                result.compared
            );
        }
    }

    #[test]
    fn reader_handles_arbitrary_input(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let reader = Reader::new(Cursor::new(data));
        for record in reader {
            if let Ok(record) = record {
                prop_assert!(!record.chromosome.starts_with('#'));
            }
        }
    }
}
