#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use compare_genotypes::compare::{Pairing, compare_records};
use compare_genotypes::record::Reader;

fuzz_target!(|data: &[u8]| {
    let reader = Reader::new(Cursor::new(data));

    // Every line either parses or yields an error; neither may panic.
    let records: Vec<_> = reader.take(1000).filter_map(Result::ok).collect();
    for record in &records {
        let _ = record.key().to_string();
        let _ = record.genotype();
    }

    let half = records.len() / 2;
    let (array, wgs) = records.split_at(half);
    for pairing in [Pairing::RowOrder, Pairing::Position] {
        let result = compare_records(array, wgs, pairing);
        assert_eq!(
            result.concordant + result.ref_alt_mismatches.len() + result.discordances.len(),
            result.compared
        );
    }
});
