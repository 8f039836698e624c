//! Genotype string handling.
//!
//! Array and sequencing callers disagree on notation for the same call: a
//! haploid region may be written `1` by one and `1/1` by the other, phased
//! output uses `|`, and heterozygous calls may list either allele first.
//! [`normalize_genotype`] rewrites a GT subfield so those spellings compare
//! equal as strings.

use std::borrow::Cow;

/// Return the GT subfield of a sample column, i.e. everything before the
/// first `:`.
pub fn genotype_subfield(sample: &str) -> &str {
    sample.split(':').next().unwrap_or(sample)
}

/// True for calls with no allele information (`.`, `./.`, `.|.`).
pub fn is_missing(genotype: &str) -> bool {
    matches!(genotype, "." | "./." | ".|.")
}

/// Canonicalize a GT subfield.
///
/// Rules, in order:
/// 1. haploid `0` becomes `0/0` and haploid `1` becomes `1/1`; any other
///    single character is left alone;
/// 2. `|` becomes `/`;
/// 3. `0/1` becomes `1/0`.
///
/// Only the biallelic 0/1 alphabet is canonicalized; other allele indices
/// pass through after separator normalization.
pub fn normalize_genotype(genotype: &str) -> Cow<'_, str> {
    match genotype {
        "0" => return Cow::Borrowed("0/0"),
        "1" => return Cow::Borrowed("1/1"),
        _ => {}
    }

    if !genotype.contains('|') && !genotype.contains("0/1") {
        return Cow::Borrowed(genotype);
    }

    Cow::Owned(genotype.replace('|', "/").replace("0/1", "1/0"))
}
