#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let gt = compare_genotypes::genotype::genotype_subfield(&input);

    let once = compare_genotypes::normalize_genotype(gt).into_owned();

    // Normalization only ever rewrites separators and the 0/1 pair, plus the
    // two haploid expansions.
    assert!(once.len() <= gt.len() + 2, "normalized genotype grew unexpectedly");
    assert!(!once.contains('|'), "phase separator survived normalization");
});
