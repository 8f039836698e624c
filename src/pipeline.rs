use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::{
    compare::{GenotypeComparison, Pairing, compare_records},
    preprocess::{
        BcftoolsPreprocessor, NativePreprocessor, PreparedInputs, PreprocessError,
        PreprocessMode, Preprocessor, ToolPaths,
    },
    record::{LoadError, load_keys, load_records},
    report::{
        self, GenotypeCounts, GenotypeStage, InputInfo, SUMMARY_JSON_FILE, SUMMARY_TEXT_FILE,
        Summary,
    },
    sets::{SetComparison, reconcile},
};

/// Everything needed to drive a comparison run.
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// Array (genotyping chip) call file, plain or gzip/BGZF compressed.
    pub array: PathBuf,
    /// Whole-genome sequencing call file, plain or gzip/BGZF compressed.
    pub wgs: PathBuf,
    /// Directory receiving every output. Created when absent.
    pub output_dir: PathBuf,
    pub preprocess: PreprocessMode,
    pub pairing: Pairing,
    pub tools: ToolPaths,
}

impl CompareConfig {
    pub fn new(array: PathBuf, wgs: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            array,
            wgs,
            output_dir,
            preprocess: PreprocessMode::default(),
            pairing: Pairing::default(),
            tools: ToolPaths::default(),
        }
    }

    fn preprocessor(&self) -> Box<dyn Preprocessor> {
        match self.preprocess {
            PreprocessMode::Native => Box::new(NativePreprocessor),
            PreprocessMode::Bcftools => Box::new(BcftoolsPreprocessor::new(self.tools.clone())),
        }
    }
}

/// Errors that end a stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("basic variant analysis failed")]
    BasicAnalysis(#[source] LoadError),
    #[error("preprocessing failed")]
    Preprocess(#[source] PreprocessError),
    #[error("aligned intersection file not found: {}", .path.display())]
    MissingIntermediateArtifact { path: PathBuf },
}

/// Results of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub sets: SetComparison,
    /// `None` when the genotype stage was skipped or failed.
    pub genotypes: Option<GenotypeComparison>,
    pub summary: Summary,
}

/// Run the three stages in order.
///
/// The basic variant analysis and preprocessing are fatal on error. Errors in
/// the genotype comparison are logged and recorded in the summary, and the
/// outputs of the earlier stages are kept.
pub fn run_comparison(config: &CompareConfig) -> Result<RunOutcome> {
    let output_dir = config.output_dir.as_path();
    fs::create_dir_all(output_dir).with_context(|| {
        format!("failed to create output directory {}", output_dir.display())
    })?;

    tracing::info!(
        array = %config.array.display(),
        wgs = %config.wgs.display(),
        output = %output_dir.display(),
        preprocess = ?config.preprocess,
        pairing = ?config.pairing,
        "starting comparison"
    );

    tracing::info!("STAGE 1: basic variant analysis");
    let sets = basic_analysis(config)?;
    report::write_set_outputs(output_dir, &sets)
        .with_context(|| format!("failed to write key listings to {}", output_dir.display()))?;

    tracing::info!("STAGE 2: preprocessing");
    let prepared = config
        .preprocessor()
        .prepare(&config.array, &config.wgs, output_dir)
        .map_err(StageError::Preprocess)?;

    tracing::info!("STAGE 3: genotype comparison");
    report::clear_genotype_outputs(output_dir).with_context(|| {
        format!("failed to clear earlier genotype tables in {}", output_dir.display())
    })?;
    let (genotypes, stage) = match genotype_stage(&prepared, config.pairing, output_dir) {
        Ok(comparison) => {
            let counts = GenotypeCounts::from(&comparison);
            log_genotype_counts(&counts);
            (Some(comparison), GenotypeStage::Completed(counts))
        }
        Err(err) => match err.downcast_ref::<StageError>() {
            Some(StageError::MissingIntermediateArtifact { path }) => {
                tracing::warn!(
                    path = %path.display(),
                    "intersection files not found; genotype comparison will not be performed. \
                     This can happen when the inputs share no variants"
                );
                let reason = err.to_string();
                (None, GenotypeStage::Skipped { reason })
            }
            _ => {
                tracing::error!("genotype comparison failed: {err:?}");
                (
                    None,
                    GenotypeStage::Failed {
                        error: format!("{err:#}"),
                    },
                )
            }
        },
    };

    let input = InputInfo {
        array: config.array.display().to_string(),
        wgs: config.wgs.display().to_string(),
        preprocess: config.preprocess,
        pairing: config.pairing,
    };
    let summary = Summary::new(input, &sets, stage);
    summary
        .write_text(&output_dir.join(SUMMARY_TEXT_FILE))
        .context("failed to write text summary")?;
    summary
        .write_json(&output_dir.join(SUMMARY_JSON_FILE))
        .context("failed to write JSON summary")?;

    tracing::info!(output = %output_dir.display(), "analysis complete");

    Ok(RunOutcome {
        sets,
        genotypes,
        summary,
    })
}

fn basic_analysis(config: &CompareConfig) -> Result<SetComparison> {
    let array = load_keys(&config.array).map_err(StageError::BasicAnalysis)?;
    let wgs = load_keys(&config.wgs).map_err(StageError::BasicAnalysis)?;

    let sets = reconcile(array, wgs);
    tracing::info!(
        total_array = sets.total_first,
        total_wgs = sets.total_second,
        shared = sets.shared.len(),
        only_array = sets.only_first.len(),
        only_wgs = sets.only_second.len(),
        "basic variant analysis finished"
    );
    Ok(sets)
}

fn genotype_stage(
    prepared: &PreparedInputs,
    pairing: Pairing,
    output_dir: &Path,
) -> Result<GenotypeComparison> {
    for path in [&prepared.aligned_array, &prepared.aligned_wgs] {
        if !path.exists() {
            return Err(StageError::MissingIntermediateArtifact { path: path.clone() }.into());
        }
    }

    let array = load_records(&prepared.aligned_array).context("failed to load aligned array")?;
    let wgs = load_records(&prepared.aligned_wgs).context("failed to load aligned WGS")?;
    tracing::info!(
        array_rows = array.records.len(),
        wgs_rows = wgs.records.len(),
        "loaded aligned records"
    );

    let comparison = if array.records.is_empty() || wgs.records.is_empty() {
        tracing::warn!("one of the aligned inputs has no data rows; no shared variants to compare");
        GenotypeComparison::default()
    } else {
        compare_records(&array.records, &wgs.records, pairing)
    };

    report::write_genotype_outputs(output_dir, &comparison)
        .context("failed to write genotype comparison tables")?;
    Ok(comparison)
}

fn log_genotype_counts(counts: &GenotypeCounts) {
    tracing::info!(
        total_shared = counts.total_shared,
        genotype_differences = counts.genotype_differences,
        ref_alt_differences = counts.ref_alt_differences,
        concordance_rate = %report::format_rate(counts.concordance_rate),
        error_rate = %report::format_rate(counts.error_rate),
        "genotype comparison finished"
    );
}
