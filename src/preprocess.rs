//! Preparation of the row-aligned inputs consumed by the genotype
//! comparison.
//!
//! Both sources have their missing calls removed and are intersected into
//! two files whose n-th data rows describe the same site. The layout of the
//! output directory mirrors `bcftools isec -p`: `0000`/`0001` hold records
//! private to the array/WGS input and `0002`/`0003` hold the shared records
//! as seen by each source.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

use crate::genotype::is_missing;
use crate::record::{LoadError, LoadedRecords, VariantRecord, load_records};

pub const ARRAY_NO_MISSING: &str = "array_noMissing.vcf";
pub const WGS_NO_MISSING: &str = "wgs_noMissing.vcf";
pub const PRIVATE_ARRAY: &str = "0000.vcf";
pub const PRIVATE_WGS: &str = "0001.vcf";
pub const ALIGNED_ARRAY: &str = "0002.vcf";
pub const ALIGNED_WGS: &str = "0003.vcf";

/// Which implementation prepares the aligned inputs.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessMode {
    /// Filter and intersect in process.
    #[default]
    Native,
    /// Delegate to bcftools, tabix and bgzip.
    Bcftools,
}

/// Paths of the row-aligned intersection produced by a [`Preprocessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInputs {
    pub aligned_array: PathBuf,
    pub aligned_wgs: PathBuf,
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("external tool `{tool}` failed with {status}")]
    ExternalToolFailure { tool: String, status: ExitStatus },
    #[error("failed to launch external tool `{tool}`")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PreprocessError {
    /// True when an external collaborator could not run to a successful
    /// completion.
    pub fn is_external_tool_failure(&self) -> bool {
        matches!(self, Self::ExternalToolFailure { .. } | Self::Spawn { .. })
    }
}

/// Filters missing genotypes from both sources and produces a row-aligned
/// intersection in `output_dir`.
pub trait Preprocessor {
    fn prepare(
        &self,
        array: &Path,
        wgs: &Path,
        output_dir: &Path,
    ) -> Result<PreparedInputs, PreprocessError>;
}

/// In-process implementation. Sites are intersected on `(CHROM, POS)` so
/// that REF/ALT disagreements survive into the comparison instead of being
/// silently dropped as private records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePreprocessor;

impl Preprocessor for NativePreprocessor {
    fn prepare(
        &self,
        array: &Path,
        wgs: &Path,
        output_dir: &Path,
    ) -> Result<PreparedInputs, PreprocessError> {
        let array = drop_missing(load_records(array)?);
        let wgs = drop_missing(load_records(wgs)?);

        write_records(&output_dir.join(ARRAY_NO_MISSING), &array.column_header, &array.records)?;
        write_records(&output_dir.join(WGS_NO_MISSING), &wgs.column_header, &wgs.records)?;

        let intersection = intersect_by_position(&array.records, &wgs.records);
        tracing::info!(
            shared = intersection.aligned_array.len(),
            private_array = intersection.private_array.len(),
            private_wgs = intersection.private_wgs.len(),
            "intersected filtered inputs by position"
        );

        write_records(
            &output_dir.join(PRIVATE_ARRAY),
            &array.column_header,
            intersection.private_array,
        )?;
        write_records(
            &output_dir.join(PRIVATE_WGS),
            &wgs.column_header,
            intersection.private_wgs,
        )?;

        let prepared = PreparedInputs {
            aligned_array: output_dir.join(ALIGNED_ARRAY),
            aligned_wgs: output_dir.join(ALIGNED_WGS),
        };
        write_records(&prepared.aligned_array, &array.column_header, intersection.aligned_array)?;
        write_records(&prepared.aligned_wgs, &wgs.column_header, intersection.aligned_wgs)?;

        Ok(prepared)
    }
}

fn drop_missing(mut loaded: LoadedRecords) -> LoadedRecords {
    let before = loaded.records.len();
    loaded.records.retain(|record| !is_missing(record.genotype()));
    tracing::debug!(
        removed = before - loaded.records.len(),
        kept = loaded.records.len(),
        "removed missing genotypes"
    );
    loaded
}

/// Records of both sources split into private and aligned shared lists.
#[derive(Debug, Default)]
pub struct Intersection<'a> {
    pub private_array: Vec<&'a VariantRecord>,
    pub private_wgs: Vec<&'a VariantRecord>,
    pub aligned_array: Vec<&'a VariantRecord>,
    pub aligned_wgs: Vec<&'a VariantRecord>,
}

/// Pair array and WGS records on `(CHROM, POS)`, keeping array order for the
/// aligned lists. When a position holds several WGS records, the one with
/// identical REF/ALT is taken first.
pub fn intersect_by_position<'a>(
    array: &'a [VariantRecord],
    wgs: &'a [VariantRecord],
) -> Intersection<'a> {
    let mut by_site: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for (index, record) in wgs.iter().enumerate() {
        by_site
            .entry((record.chromosome.as_str(), record.position.as_str()))
            .or_default()
            .push(index);
    }

    let mut used = vec![false; wgs.len()];
    let mut intersection = Intersection::default();

    for record in array {
        let partner = by_site
            .get(&(record.chromosome.as_str(), record.position.as_str()))
            .and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| {
                        !used[i]
                            && wgs[i].reference == record.reference
                            && wgs[i].alternate == record.alternate
                    })
                    .or_else(|| candidates.iter().copied().find(|&i| !used[i]))
            });

        match partner {
            Some(index) => {
                used[index] = true;
                intersection.aligned_array.push(record);
                intersection.aligned_wgs.push(&wgs[index]);
            }
            None => intersection.private_array.push(record),
        }
    }

    intersection.private_wgs = wgs
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(record, _)| record)
        .collect();

    intersection
}

fn write_records<'a, I>(
    path: &Path,
    column_header: &Option<String>,
    records: I,
) -> Result<(), PreprocessError>
where
    I: IntoIterator<Item = &'a VariantRecord>,
{
    let write = || -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        if let Some(header) = column_header {
            writeln!(writer, "{header}")?;
        }
        for record in records {
            writeln!(writer, "{}", record.raw())?;
        }
        writer.flush()
    };

    write().map_err(|source| PreprocessError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Executables used by [`BcftoolsPreprocessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub bcftools: PathBuf,
    pub tabix: PathBuf,
    pub bgzip: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            bcftools: PathBuf::from("bcftools"),
            tabix: PathBuf::from("tabix"),
            bgzip: PathBuf::from("bgzip"),
        }
    }
}

/// Delegates filtering and intersection to `bcftools view`/`bcftools isec`,
/// indexing to `tabix` and compression to `bgzip`.
///
/// `bcftools isec` matches records on identical REF/ALT, so with this
/// implementation REF/ALT mismatches only reach the comparison when the
/// inputs were already collapsed upstream.
#[derive(Debug, Clone, Default)]
pub struct BcftoolsPreprocessor {
    pub tools: ToolPaths,
}

impl BcftoolsPreprocessor {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    fn filter_missing(
        &self,
        input: &Path,
        output: &Path,
        exclude: &str,
    ) -> Result<(), PreprocessError> {
        let mut view = Command::new(&self.tools.bcftools);
        view.arg("view")
            .arg("-e")
            .arg(exclude)
            .arg("-Oz")
            .arg("-o")
            .arg(output)
            .arg(input);
        run(view)?;

        let mut tabix = Command::new(&self.tools.tabix);
        tabix.arg(output);
        run(tabix)
    }
}

impl Preprocessor for BcftoolsPreprocessor {
    fn prepare(
        &self,
        array: &Path,
        wgs: &Path,
        output_dir: &Path,
    ) -> Result<PreparedInputs, PreprocessError> {
        let array_filtered = output_dir.join(format!("{ARRAY_NO_MISSING}.gz"));
        let wgs_filtered = output_dir.join(format!("{WGS_NO_MISSING}.gz"));

        tracing::info!("excluding missing genotypes from the array input");
        self.filter_missing(array, &array_filtered, r#"GT="./.""#)?;

        tracing::info!("excluding missing genotypes from the WGS input");
        self.filter_missing(wgs, &wgs_filtered, r#"GT="./." || GT=".""#)?;

        tracing::info!("intersecting filtered inputs");
        let mut isec = Command::new(&self.tools.bcftools);
        isec.arg("isec")
            .arg(&array_filtered)
            .arg(&wgs_filtered)
            .arg("-p")
            .arg(output_dir);
        run(isec)?;

        tracing::info!("compressing intersection files");
        for name in [ALIGNED_ARRAY, ALIGNED_WGS] {
            let mut bgzip = Command::new(&self.tools.bgzip);
            bgzip.arg("-f").arg(output_dir.join(name));
            run(bgzip)?;
        }

        Ok(PreparedInputs {
            aligned_array: output_dir.join(format!("{ALIGNED_ARRAY}.gz")),
            aligned_wgs: output_dir.join(format!("{ALIGNED_WGS}.gz")),
        })
    }
}

fn run(mut command: Command) -> Result<(), PreprocessError> {
    let tool = command.get_program().to_string_lossy().into_owned();
    tracing::info!(command = ?command, "running external tool");

    let status = command
        .status()
        .map_err(|source| PreprocessError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        tracing::error!(tool = %tool, %status, "external tool failed");
        Err(PreprocessError::ExternalToolFailure { tool, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_record;

    fn record(pos: &str, r: &str, a: &str, gt: &str) -> VariantRecord {
        parse_record(&format!("1\t{pos}\t.\t{r}\t{a}\t.\t.\t.\tGT\t{gt}")).unwrap()
    }

    #[test]
    fn intersection_keeps_array_order() {
        let array = vec![record("300", "T", "C", "0/1"), record("100", "A", "T", "1/1")];
        let wgs = vec![
            record("100", "A", "T", "1|1"),
            record("200", "G", "A", "0/1"),
            record("300", "T", "C", "0|1"),
        ];

        let result = intersect_by_position(&array, &wgs);
        let positions = |records: &[&VariantRecord]| {
            records.iter().map(|r| r.position.clone()).collect::<Vec<_>>()
        };
        assert_eq!(positions(&result.aligned_array), ["300", "100"]);
        assert_eq!(positions(&result.aligned_wgs), ["300", "100"]);
        assert!(result.private_array.is_empty());
        assert_eq!(positions(&result.private_wgs), ["200"]);
    }

    #[test]
    fn intersection_pairs_differing_alleles_at_same_position() {
        let array = vec![record("150", "A", "T", "1/1")];
        let wgs = vec![record("150", "A", "C", "1/1")];
        let result = intersect_by_position(&array, &wgs);
        assert_eq!(result.aligned_array.len(), 1);
        assert_eq!(result.aligned_wgs[0].alternate, "C");
    }

    #[test]
    fn native_preprocessor_filters_missing_and_writes_aligned_files() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("array.vcf");
        let wgs = dir.path().join("wgs.vcf");
        let header = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1";
        std::fs::write(
            &array,
            format!(
                "##fileformat=VCFv4.2\n{header}\n\
                 1\t100\trs1\tA\tT\t.\t.\t.\tGT\t0/1\n\
                 1\t200\trs2\tC\tG\t.\t.\t.\tGT\t./.\n"
            ),
        )
        .unwrap();
        std::fs::write(
            &wgs,
            format!(
                "{header}\n\
                 1\t100\trs1\tA\tT\t.\t.\t.\tGT\t1|0\n\
                 1\t200\trs2\tC\tG\t.\t.\t.\tGT\t1/1\n\
                 1\t300\trs3\tT\tC\t.\t.\t.\tGT\t.\n"
            ),
        )
        .unwrap();

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let prepared = NativePreprocessor.prepare(&array, &wgs, &out).unwrap();

        let aligned_array = load_records(&prepared.aligned_array).unwrap();
        let aligned_wgs = load_records(&prepared.aligned_wgs).unwrap();
        assert_eq!(aligned_array.column_header.as_deref(), Some(header));
        assert_eq!(aligned_array.records.len(), 1);
        assert_eq!(aligned_wgs.records.len(), 1);
        assert_eq!(aligned_wgs.records[0].genotype(), "1|0");

        let private_wgs = load_records(&out.join(PRIVATE_WGS)).unwrap();
        assert_eq!(private_wgs.records.len(), 1);
        assert_eq!(private_wgs.records[0].position, "200");

        let filtered_wgs = load_records(&out.join(WGS_NO_MISSING)).unwrap();
        assert_eq!(filtered_wgs.records.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolPaths {
            bcftools: PathBuf::from("false"),
            ..ToolPaths::default()
        };
        let err = BcftoolsPreprocessor::new(tools)
            .prepare(Path::new("a.vcf"), Path::new("b.vcf"), dir.path())
            .unwrap_err();
        assert!(matches!(err, PreprocessError::ExternalToolFailure { .. }));
        assert!(err.is_external_tool_failure());
    }

    #[test]
    fn missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolPaths {
            bcftools: dir.path().join("no-such-bcftools"),
            ..ToolPaths::default()
        };
        let err = BcftoolsPreprocessor::new(tools)
            .prepare(Path::new("a.vcf"), Path::new("b.vcf"), dir.path())
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Spawn { .. }));
        assert!(err.is_external_tool_failure());
    }
}
