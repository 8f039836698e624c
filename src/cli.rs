use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{
    compare::Pairing,
    pipeline::{CompareConfig, run_comparison},
    preprocess::{PreprocessMode, ToolPaths},
};

/// Name of the run log written inside the output directory.
pub const LOG_FILE: &str = "compare.log";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Compare array genotype calls against whole-genome sequencing calls",
    long_about = None
)]
struct Cli {
    /// Array (genotyping chip) VCF, optionally gzip/BGZF compressed
    #[arg(value_name = "ARRAY")]
    array: PathBuf,

    /// Whole-genome sequencing VCF, optionally gzip/BGZF compressed
    #[arg(value_name = "WGS")]
    wgs: PathBuf,

    /// Output directory (created if absent)
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// How missing genotypes are filtered and the inputs intersected
    #[arg(long, value_enum, default_value_t = PreprocessMode::Native)]
    preprocess: PreprocessMode,

    /// How rows of the intersected files are paired for genotype comparison
    #[arg(long, value_enum, default_value_t = Pairing::RowOrder)]
    pairing: Pairing,

    /// bcftools executable used with `--preprocess bcftools`
    #[arg(long, env = "COMPARE_GENOTYPES_BCFTOOLS", default_value = "bcftools")]
    bcftools: PathBuf,

    /// tabix executable used with `--preprocess bcftools`
    #[arg(long, default_value = "tabix")]
    tabix: PathBuf,

    /// bgzip executable used with `--preprocess bcftools`
    #[arg(long, default_value = "bgzip")]
    bgzip: PathBuf,

    /// Logging verbosity (e.g. error, warn, info, debug). Falls back to
    /// RUST_LOG, then `info`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> (CompareConfig, Option<String>) {
        let config = CompareConfig {
            array: self.array,
            wgs: self.wgs,
            output_dir: self.output_dir,
            preprocess: self.preprocess,
            pairing: self.pairing,
            tools: ToolPaths {
                bcftools: self.bcftools,
                tabix: self.tabix,
                bgzip: self.bgzip,
            },
        };
        (config, self.log_level)
    }
}

pub fn run() -> Result<()> {
    let (config, log_level) = Cli::parse().into_config();
    execute(&config, log_level.as_deref())
}

/// Run a comparison with logging routed to stderr and to `compare.log` in
/// the output directory. The subscriber is only active for this call.
pub fn execute(config: &CompareConfig, log_level: Option<&str>) -> Result<()> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;

    let dispatch = build_dispatch(log_level, &config.output_dir.join(LOG_FILE))?;
    tracing::dispatcher::with_default(&dispatch, || {
        let result = run_comparison(config);
        match &result {
            Ok(outcome) => tracing::info!(
                shared = outcome.summary.basic.shared,
                "results saved to {}",
                config.output_dir.display()
            ),
            Err(err) => tracing::error!("comparison aborted: {err:#}"),
        }
        result.map(|_| ())
    })
}

fn build_dispatch(level: Option<&str>, log_path: &Path) -> Result<Dispatch> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let log_file = File::create(log_path)
        .with_context(|| format!("failed to create log file {}", log_path.display()))?;

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        );
    Ok(Dispatch::new(subscriber))
}
