//! Output files and the run summary.
//!
//! Everything here formats results that were already computed by the set
//! and genotype stages; nothing is recounted.

use std::{
    fmt::Write as _,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use serde::Serialize;

use crate::compare::{ComparisonPair, GenotypeComparison, Pairing};
use crate::preprocess::PreprocessMode;
use crate::record::VariantKey;
use crate::sets::SetComparison;

pub const ONLY_ARRAY_FILE: &str = "only_array.txt";
pub const ONLY_WGS_FILE: &str = "only_wgs.txt";
pub const SHARED_FILE: &str = "shared.txt";
pub const DISCORDANCE_FILE: &str = "discordances.txt";
pub const REF_ALT_FILE: &str = "ref_alt_diff.txt";
pub const SUMMARY_TEXT_FILE: &str = "summary.txt";
pub const SUMMARY_JSON_FILE: &str = "summary.json";

/// Column header of the discordance and REF/ALT mismatch tables.
pub const PAIR_HEADER: [&str; 10] = [
    "POS_array",
    "RSID_array",
    "REF_array",
    "ALT_array",
    "GT_array",
    "POS_wgs",
    "RSID_wgs",
    "REF_wgs",
    "ALT_wgs",
    "GT_wgs",
];

/// Percentage of `part` in `total`, or `None` when nothing was compared.
pub fn rate(part: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(part as f64 / total as f64 * 100.0)
    }
}

/// Counts from the key-level comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BasicCounts {
    pub total_array: usize,
    pub total_wgs: usize,
    pub shared: usize,
    pub only_array: usize,
    pub only_wgs: usize,
}

impl From<&SetComparison> for BasicCounts {
    fn from(sets: &SetComparison) -> Self {
        BasicCounts {
            total_array: sets.total_first,
            total_wgs: sets.total_second,
            shared: sets.shared.len(),
            only_array: sets.only_first.len(),
            only_wgs: sets.only_second.len(),
        }
    }
}

/// Counts and rates from the genotype comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenotypeCounts {
    pub total_shared: usize,
    pub concordant: usize,
    pub genotype_differences: usize,
    pub ref_alt_differences: usize,
    pub unpaired_array: usize,
    pub unpaired_wgs: usize,
    /// `None` when no rows were compared.
    pub concordance_rate: Option<f64>,
    /// `None` when no rows were compared.
    pub error_rate: Option<f64>,
}

impl From<&GenotypeComparison> for GenotypeCounts {
    fn from(c: &GenotypeComparison) -> Self {
        let discordant = c.discordances.len();
        GenotypeCounts {
            total_shared: c.compared,
            concordant: c.concordant,
            genotype_differences: discordant,
            ref_alt_differences: c.ref_alt_mismatches.len(),
            unpaired_array: c.unpaired_first,
            unpaired_wgs: c.unpaired_second,
            concordance_rate: rate(c.compared.saturating_sub(discordant), c.compared),
            error_rate: rate(discordant, c.compared),
        }
    }
}

/// What became of the genotype comparison stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenotypeStage {
    Completed(GenotypeCounts),
    /// The stage did not run, e.g. because the aligned files were absent.
    Skipped { reason: String },
    /// The stage raised an error; earlier results were still written.
    Failed { error: String },
}

impl GenotypeStage {
    pub fn counts(&self) -> Option<&GenotypeCounts> {
        match self {
            Self::Completed(counts) => Some(counts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputInfo {
    pub array: String,
    pub wgs: String,
    pub preprocess: PreprocessMode,
    pub pairing: Pairing,
}

/// Complete summary of a comparison run, written as `summary.txt` and
/// `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub version: String,
    /// Timestamp of the run (RFC 3339, UTC)
    pub timestamp: String,
    pub input: InputInfo,
    pub basic: BasicCounts,
    pub genotype: GenotypeStage,
}

impl Summary {
    pub fn new(input: InputInfo, sets: &SetComparison, genotype: GenotypeStage) -> Self {
        let now = time::OffsetDateTime::now_utc();
        let timestamp = now
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        Summary {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            input,
            basic: BasicCounts::from(sets),
            genotype,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "GENOTYPE COMPARISON SUMMARY")?;
        writeln!(out, "{}", "=".repeat(40))?;
        writeln!(out, "Array VCF: {}", self.input.array)?;
        writeln!(out, "WGS VCF: {}", self.input.wgs)?;
        writeln!(out, "Date/Time: {}", self.timestamp)?;

        writeln!(out, "\nBASIC STATISTICS:")?;
        writeln!(out, "Total array variants: {}", self.basic.total_array)?;
        writeln!(out, "Total WGS variants: {}", self.basic.total_wgs)?;
        writeln!(out, "Shared variants: {}", self.basic.shared)?;
        writeln!(out, "Array-only variants: {}", self.basic.only_array)?;
        writeln!(out, "WGS-only variants: {}", self.basic.only_wgs)?;

        writeln!(out, "\nGENOTYPE ANALYSIS:")?;
        let not_run = GenotypeCounts::default();
        let counts = self.genotype.counts().unwrap_or(&not_run);
        writeln!(out, "Shared variants analysed: {}", counts.total_shared)?;
        writeln!(out, "Genotype differences: {}", counts.genotype_differences)?;
        writeln!(out, "REF/ALT differences: {}", counts.ref_alt_differences)?;
        if counts.unpaired_array > 0 || counts.unpaired_wgs > 0 {
            writeln!(
                out,
                "Unpaired rows (array/WGS): {}/{}",
                counts.unpaired_array, counts.unpaired_wgs
            )?;
        }
        writeln!(out, "Concordance rate: {}", format_rate(counts.concordance_rate))?;
        writeln!(out, "Error rate: {}", format_rate(counts.error_rate))?;
        match &self.genotype {
            GenotypeStage::Completed(_) => {}
            GenotypeStage::Skipped { reason } => {
                writeln!(out, "Genotype comparison skipped: {reason}")?;
            }
            GenotypeStage::Failed { error } => {
                writeln!(out, "Genotype comparison failed: {error}")?;
            }
        }
        Ok(())
    }

    pub fn write_text(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.render_text())?;
        tracing::info!("Wrote summary to {}", path.display());
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)?;
        tracing::info!("Wrote run report to {}", path.display());
        Ok(())
    }
}

/// Render a rate with two decimals, or `N/A`.
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(value) => format!("{value:.2}%"),
        None => String::from("N/A"),
    }
}

/// Write one tab-separated key per line.
pub fn write_keys(path: &Path, keys: &[VariantKey]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for key in keys {
        writeln!(writer, "{key}")?;
    }
    writer.flush()
}

/// Write a 10-column pair table preceded by [`PAIR_HEADER`].
pub fn write_pairs(path: &Path, pairs: &[ComparisonPair]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", PAIR_HEADER.join("\t"))?;
    for pair in pairs {
        writeln!(writer, "{pair}")?;
    }
    writer.flush()
}

/// Write the private and shared key listings.
pub fn write_set_outputs(dir: &Path, sets: &SetComparison) -> io::Result<()> {
    write_keys(&dir.join(ONLY_ARRAY_FILE), &sets.only_first)?;
    write_keys(&dir.join(ONLY_WGS_FILE), &sets.only_second)?;
    write_keys(&dir.join(SHARED_FILE), &sets.shared)?;
    tracing::info!("Basic variant files written");
    Ok(())
}

/// Remove the genotype tables of an earlier run in `dir`.
pub fn clear_genotype_outputs(dir: &Path) -> io::Result<()> {
    remove_if_present(&dir.join(DISCORDANCE_FILE))?;
    remove_if_present(&dir.join(REF_ALT_FILE))
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Write the discordance table and, when there is anything to report, the
/// REF/ALT mismatch table. A mismatch table left by an earlier run is removed
/// when there is nothing to report.
pub fn write_genotype_outputs(dir: &Path, comparison: &GenotypeComparison) -> io::Result<()> {
    write_pairs(&dir.join(DISCORDANCE_FILE), &comparison.discordances)?;
    if comparison.ref_alt_mismatches.is_empty() {
        remove_if_present(&dir.join(REF_ALT_FILE))?;
    } else {
        tracing::warn!(
            count = comparison.ref_alt_mismatches.len(),
            "REF/ALT alleles disagree at some shared positions; see {REF_ALT_FILE}"
        );
        write_pairs(&dir.join(REF_ALT_FILE), &comparison.ref_alt_mismatches)?;
    }
    Ok(())
}
