#![doc = include_str!("../README.md")]

pub mod cli;
pub mod compare;
pub mod genotype;
pub mod pipeline;
pub mod preprocess;
pub mod record;
pub mod report;
pub mod sets;
pub mod smart_reader;

pub use compare::{GenotypeComparison, Pairing, compare_records};
pub use genotype::normalize_genotype;
pub use pipeline::{CompareConfig, RunOutcome, run_comparison};
pub use preprocess::PreprocessMode;
pub use record::{VariantKey, VariantRecord};
pub use sets::{SetComparison, reconcile};
