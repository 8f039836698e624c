//! Site-by-site genotype reconciliation between two aligned call sets.
//!
//! Each aligned pair lands in exactly one bucket:
//!
//! * REF/ALT mismatch: the two sources disagree on the alleles themselves,
//!   so their genotypes are not comparable and are never normalized;
//! * concordant: the GT subfields are equal, either verbatim or after
//!   [`normalize_genotype`];
//! * discordant: the GT subfields still differ after normalization.

use std::collections::HashMap;
use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::genotype::normalize_genotype;
use crate::record::VariantRecord;

/// How rows of the two aligned inputs are paired up.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pairing {
    /// Pair the n-th array row with the n-th WGS row.
    #[default]
    RowOrder,
    /// Pair rows sharing `(CHROM, POS)`, regardless of their order.
    Position,
}

/// The five columns reported for one side of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub position: String,
    pub id: String,
    pub reference: String,
    pub alternate: String,
    pub genotype: String,
}

impl SiteInfo {
    fn from_record(record: &VariantRecord, genotype: &str) -> Self {
        Self {
            position: record.position.clone(),
            id: record.id.clone(),
            reference: record.reference.clone(),
            alternate: record.alternate.clone(),
            genotype: genotype.to_string(),
        }
    }
}

impl fmt::Display for SiteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.position, self.id, self.reference, self.alternate, self.genotype
        )
    }
}

/// An array site and the WGS site it was aligned with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonPair {
    pub array: SiteInfo,
    pub wgs: SiteInfo,
}

impl fmt::Display for ComparisonPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.array, self.wgs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Concordant,
    RefAltMismatch,
    Discordant,
}

/// Classify one aligned pair.
pub fn classify(array: &VariantRecord, wgs: &VariantRecord) -> Classification {
    if array.reference != wgs.reference || array.alternate != wgs.alternate {
        return Classification::RefAltMismatch;
    }

    let (array_gt, wgs_gt) = (array.genotype(), wgs.genotype());
    if array_gt == wgs_gt || normalize_genotype(array_gt) == normalize_genotype(wgs_gt) {
        Classification::Concordant
    } else {
        Classification::Discordant
    }
}

/// Outcome of the genotype comparison stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenotypeComparison {
    /// Number of pairs that were classified.
    pub compared: usize,
    pub concordant: usize,
    /// Pairs with differing REF/ALT, carrying the raw GT subfields.
    pub ref_alt_mismatches: Vec<ComparisonPair>,
    /// Pairs whose genotypes differ after normalization, carrying the
    /// normalized GT subfields.
    pub discordances: Vec<ComparisonPair>,
    /// Array rows left without a partner.
    pub unpaired_first: usize,
    /// WGS rows left without a partner.
    pub unpaired_second: usize,
}

impl GenotypeComparison {
    fn record(&mut self, array: &VariantRecord, wgs: &VariantRecord) {
        self.compared += 1;
        match classify(array, wgs) {
            Classification::Concordant => self.concordant += 1,
            Classification::RefAltMismatch => {
                tracing::debug!(
                    position = %array.position,
                    array_ref = %array.reference,
                    array_alt = %array.alternate,
                    wgs_ref = %wgs.reference,
                    wgs_alt = %wgs.alternate,
                    "REF/ALT mismatch"
                );
                self.ref_alt_mismatches.push(ComparisonPair {
                    array: SiteInfo::from_record(array, array.genotype()),
                    wgs: SiteInfo::from_record(wgs, wgs.genotype()),
                });
            }
            Classification::Discordant => {
                self.discordances.push(ComparisonPair {
                    array: SiteInfo::from_record(array, &normalize_genotype(array.genotype())),
                    wgs: SiteInfo::from_record(wgs, &normalize_genotype(wgs.genotype())),
                });
            }
        }
    }

    /// True when no pair could be formed, in which case rates are not
    /// applicable.
    pub fn is_empty(&self) -> bool {
        self.compared == 0
    }
}

/// Compare two aligned record sequences.
pub fn compare_records(
    array: &[VariantRecord],
    wgs: &[VariantRecord],
    pairing: Pairing,
) -> GenotypeComparison {
    let comparison = match pairing {
        Pairing::RowOrder => compare_row_order(array, wgs),
        Pairing::Position => compare_by_position(array, wgs),
    };

    tracing::debug!(
        compared = comparison.compared,
        concordant = comparison.concordant,
        discordant = comparison.discordances.len(),
        ref_alt_mismatches = comparison.ref_alt_mismatches.len(),
        "genotype comparison finished"
    );
    comparison
}

fn compare_row_order(array: &[VariantRecord], wgs: &[VariantRecord]) -> GenotypeComparison {
    let mut comparison = GenotypeComparison::default();

    if array.len() != wgs.len() {
        tracing::warn!(
            array_rows = array.len(),
            wgs_rows = wgs.len(),
            "aligned inputs differ in length; comparing the common prefix only"
        );
    }

    for (a, w) in array.iter().zip(wgs) {
        if a.chromosome != w.chromosome || a.position != w.position {
            tracing::warn!(
                line = a.line,
                array_chrom = %a.chromosome,
                array_pos = %a.position,
                wgs_chrom = %w.chromosome,
                wgs_pos = %w.position,
                "row-aligned records refer to different sites"
            );
        }
        comparison.record(a, w);
    }

    comparison.unpaired_first = array.len().saturating_sub(wgs.len());
    comparison.unpaired_second = wgs.len().saturating_sub(array.len());
    comparison
}

fn compare_by_position(array: &[VariantRecord], wgs: &[VariantRecord]) -> GenotypeComparison {
    let mut comparison = GenotypeComparison::default();

    let mut by_site: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for (index, record) in wgs.iter().enumerate() {
        by_site
            .entry((record.chromosome.as_str(), record.position.as_str()))
            .or_default()
            .push(index);
    }
    let mut used = vec![false; wgs.len()];

    for a in array {
        let Some(candidates) = by_site.get(&(a.chromosome.as_str(), a.position.as_str())) else {
            comparison.unpaired_first += 1;
            continue;
        };

        let same_alleles = candidates.iter().copied().find(|&i| {
            !used[i] && wgs[i].reference == a.reference && wgs[i].alternate == a.alternate
        });
        let partner = same_alleles.or_else(|| candidates.iter().copied().find(|&i| !used[i]));

        match partner {
            Some(index) => {
                used[index] = true;
                comparison.record(a, &wgs[index]);
            }
            None => comparison.unpaired_first += 1,
        }
    }

    comparison.unpaired_second = used.iter().filter(|u| !**u).count();
    if comparison.unpaired_first > 0 || comparison.unpaired_second > 0 {
        tracing::warn!(
            unpaired_array = comparison.unpaired_first,
            unpaired_wgs = comparison.unpaired_second,
            "some records had no positional partner"
        );
    }
    comparison
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_record;

    fn site(chrom: &str, pos: &str, id: &str, r: &str, a: &str, gt: &str) -> VariantRecord {
        parse_record(&format!(
            "{chrom}\t{pos}\t{id}\t{r}\t{a}\t.\tPASS\t.\tGT:GQ\t{gt}:50"
        ))
        .expect("valid test record")
    }

    #[test]
    fn notation_only_difference_is_concordant() {
        let array = site("1", "100", "rs1", "A", "T", "0/1");
        let wgs = site("1", "100", "rs1", "A", "T", "1|0");
        assert_eq!(classify(&array, &wgs), Classification::Concordant);
    }

    #[test]
    fn haploid_call_matches_homozygous_diploid() {
        let array = site("X", "100", "rs1", "A", "T", "1/1");
        let wgs = site("X", "100", "rs1", "A", "T", "1");
        assert_eq!(classify(&array, &wgs), Classification::Concordant);
    }

    #[test]
    fn allele_difference_is_a_mismatch() {
        let array = site("1", "150", "rs2", "A", "T", "1/1");
        let wgs = site("1", "150", "rs2", "A", "C", "1/1");
        assert_eq!(classify(&array, &wgs), Classification::RefAltMismatch);
    }

    #[test]
    fn real_genotype_difference_is_discordant() {
        let array = site("1", "200", "rs3", "C", "G", "0/0");
        let wgs = site("1", "200", "rs3", "C", "G", "0|1");
        assert_eq!(classify(&array, &wgs), Classification::Discordant);
    }

    #[test]
    fn discordances_carry_normalized_genotypes() {
        let array = vec![site("1", "200", "rs3", "C", "G", "0")];
        let wgs = vec![site("1", "200", "rs3", "C", "G", "0|1")];
        let result = compare_records(&array, &wgs, Pairing::RowOrder);
        assert_eq!(result.discordances.len(), 1);
        assert_eq!(
            result.discordances[0].to_string(),
            "200\trs3\tC\tG\t0/0\t200\trs3\tC\tG\t1/0"
        );
    }

    #[test]
    fn mismatches_carry_raw_genotypes() {
        let array = vec![site("1", "150", "rs2", "A", "T", "1")];
        let wgs = vec![site("1", "150", "rs2", "A", "C", "0|1")];
        let result = compare_records(&array, &wgs, Pairing::RowOrder);
        assert_eq!(result.ref_alt_mismatches.len(), 1);
        assert_eq!(result.ref_alt_mismatches[0].array.genotype, "1");
        assert_eq!(result.ref_alt_mismatches[0].wgs.genotype, "0|1");
        assert!(result.discordances.is_empty());
    }

    #[test]
    fn counts_partition_compared_rows() {
        let array = vec![
            site("1", "100", "rs1", "A", "T", "0/1"),
            site("1", "150", "rs2", "A", "T", "1/1"),
            site("1", "200", "rs3", "C", "G", "0/0"),
            site("1", "250", "rs4", "G", "A", "1/1"),
        ];
        let wgs = vec![
            site("1", "100", "rs1", "A", "T", "1|0"),
            site("1", "150", "rs2", "A", "C", "1/1"),
            site("1", "200", "rs3", "C", "G", "1/1"),
            site("1", "250", "rs4", "G", "A", "1/1"),
        ];
        let result = compare_records(&array, &wgs, Pairing::RowOrder);
        assert_eq!(result.compared, 4);
        assert_eq!(result.concordant, 2);
        assert_eq!(result.ref_alt_mismatches.len(), 1);
        assert_eq!(result.discordances.len(), 1);
        assert_eq!(
            result.concordant + result.ref_alt_mismatches.len() + result.discordances.len(),
            result.compared
        );
    }

    #[test]
    fn empty_inputs_compare_nothing() {
        let result = compare_records(&[], &[], Pairing::RowOrder);
        assert!(result.is_empty());
        let one = vec![site("1", "1", ".", "A", "C", "0/1")];
        let result = compare_records(&one, &[], Pairing::RowOrder);
        assert!(result.is_empty());
        assert_eq!(result.unpaired_first, 1);
    }

    #[test]
    fn row_order_uses_common_prefix() {
        let array = vec![
            site("1", "1", ".", "A", "C", "0/1"),
            site("1", "2", ".", "A", "C", "0/1"),
        ];
        let wgs = vec![site("1", "1", ".", "A", "C", "0/1")];
        let result = compare_records(&array, &wgs, Pairing::RowOrder);
        assert_eq!(result.compared, 1);
        assert_eq!(result.unpaired_first, 1);
        assert_eq!(result.unpaired_second, 0);
    }

    #[test]
    fn position_pairing_realigns_shuffled_rows() {
        let array = vec![
            site("1", "100", "rs1", "A", "T", "0/1"),
            site("1", "200", "rs2", "C", "G", "1/1"),
            site("1", "300", "rs3", "T", "C", "0/0"),
        ];
        let wgs = vec![
            site("1", "200", "rs2", "C", "G", "1|1"),
            site("1", "400", "rs9", "G", "A", "0/1"),
            site("1", "100", "rs1", "A", "T", "1|0"),
        ];

        let by_row = compare_records(&array, &wgs, Pairing::RowOrder);
        assert_eq!(by_row.concordant, 0);

        let by_position = compare_records(&array, &wgs, Pairing::Position);
        assert_eq!(by_position.compared, 2);
        assert_eq!(by_position.concordant, 2);
        assert_eq!(by_position.unpaired_first, 1);
        assert_eq!(by_position.unpaired_second, 1);
    }

    #[test]
    fn position_pairing_prefers_matching_alleles() {
        let array = vec![site("1", "100", "rs1", "A", "G", "0/1")];
        let wgs = vec![
            site("1", "100", "rs1", "A", "T", "0/1"),
            site("1", "100", "rs1", "A", "G", "0/1"),
        ];
        let result = compare_records(&array, &wgs, Pairing::Position);
        assert_eq!(result.concordant, 1);
        assert!(result.ref_alt_mismatches.is_empty());
        assert_eq!(result.unpaired_second, 1);
    }
}
