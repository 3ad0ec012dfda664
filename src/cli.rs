//! The `cli` module defines the command-line surface: a top-level [`Cli`] with global flags and
//! a [`Command`] subcommand for each pipeline operation, one variant per operation so each
//! gets its own, independently documented argument set.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI: global flags plus a dispatched subcommand.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enables debug-level tracing output.
    #[arg(long, help = "Enable debug-level logging.", default_value = "false")]
    pub debug: bool,
    /// Path to an optional TOML config file overriding [`crate::config::PipelineConfig`]'s
    /// defaults.
    #[arg(long, help = "Path to a TOML pipeline config file.")]
    pub config: Option<PathBuf>,
    /// Overrides the configured batch size for progress reporting and batch-transactional
    /// writes.
    #[arg(long, help = "Documents processed per batch.")]
    pub batch_size: Option<usize>,
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// One pipeline operation. Every variant that reads source data takes `--documents` (and, where
/// relevant, `--gazetteer`/`--expanded`) as paths to CSV snapshots, since real-store ingestion
/// is out of this crate's scope; the CLI's in-memory ports are seeded directly from these files.
#[derive(Subcommand)]
pub enum Command {
    /// Runs L0 through L4 end-to-end.
    ComprehensiveMatch {
        /// CSV snapshot of source documents.
        #[arg(long)]
        documents: PathBuf,
        /// CSV snapshot of the base gazetteer.
        #[arg(long)]
        gazetteer: PathBuf,
        /// CSV snapshot of the expanded-range overlay, if one has already been built.
        #[arg(long)]
        expanded: Option<PathBuf>,
        /// Where to write the resulting effective fact table.
        #[arg(long, default_value = "fact_table.csv")]
        output: PathBuf,
    },
    /// Runs only L2 (conservative validated search) against an already-populated fact table.
    Layer2Parallel {
        #[arg(long)]
        documents: PathBuf,
        #[arg(long)]
        gazetteer: PathBuf,
        #[arg(long)]
        expanded: Option<PathBuf>,
        #[arg(long)]
        fact_table: PathBuf,
        #[arg(long, default_value = "fact_table.csv")]
        output: PathBuf,
    },
    /// Runs L3a then L3b against an already-populated fact table.
    Layer3ParallelCombined {
        #[arg(long)]
        documents: PathBuf,
        #[arg(long)]
        gazetteer: PathBuf,
        #[arg(long)]
        expanded: Option<PathBuf>,
        #[arg(long)]
        fact_table: PathBuf,
        #[arg(long, default_value = "fact_table.csv")]
        output: PathBuf,
    },
    /// Runs L4 (group consensus correction) and writes the reconstructed effective fact table.
    ApplyCorrections {
        #[arg(long)]
        documents: PathBuf,
        #[arg(long)]
        fact_table: PathBuf,
        #[arg(long, default_value = "corrected_fact_table.csv")]
        output: PathBuf,
    },
    /// Expands every range-shaped gazetteer entry into its individual members.
    ExpandLlpgRanges {
        #[arg(long)]
        gazetteer: PathBuf,
        #[arg(long, default_value = "expanded.csv")]
        output: PathBuf,
    },
    /// Checks the fact table and gazetteer against the pipeline's universal invariants.
    ValidateIntegrity {
        #[arg(long)]
        documents: PathBuf,
        #[arg(long)]
        gazetteer: PathBuf,
        #[arg(long)]
        fact_table: PathBuf,
    },
    /// Prints summary statistics over the effective fact table.
    Stats {
        #[arg(long)]
        fact_table: PathBuf,
        #[arg(long)]
        corrections: Option<PathBuf>,
    },
}
