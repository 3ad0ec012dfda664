//! Binary entry point: parses [`llpg_match::cli::Cli`], seeds the in-memory ports from the CSV
//! snapshots named on the command line, and dispatches to [`llpg_match::pipeline`].
use anyhow::Context;
use clap::Parser;
use llpg_match::cli::{Cli, Command};
use llpg_match::config::PipelineConfig;
use llpg_match::domain::{CanonicalAddress, ExpandedAddress, FactRow, SourceDocument};
use llpg_match::pipeline::{self, PipelineDriver};
use llpg_match::ports::{
    CorrectionOverlay, FactStore, IndicatifProgressSink, InMemoryAddressCorpus, InMemoryCorrectionOverlay,
    InMemoryFactStore, InMemorySourcePool,
};
use llpg_match::utils::{self, trace_init};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    trace_init(cli.debug);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    let driver = PipelineDriver::new(config);
    let progress = IndicatifProgressSink::default();

    match cli.command {
        Command::ComprehensiveMatch {
            documents,
            gazetteer,
            expanded,
            output,
        } => {
            let pool = load_pool(&documents)?;
            let corpus = load_corpus(&gazetteer, expanded.as_deref())?;
            let store = InMemoryFactStore::default();
            let overlay = InMemoryCorrectionOverlay::default();

            let summary = driver.run_full(&pool, &corpus, &store, &overlay, &progress)?;
            driver.snapshot_fact_table(&store, &overlay, &output)?;
            print_json(&summary)?;
        }

        Command::Layer2Parallel {
            documents,
            gazetteer,
            expanded,
            fact_table,
            output,
        } => {
            let pool = load_pool(&documents)?;
            let corpus = load_corpus(&gazetteer, expanded.as_deref())?;
            let store = load_store(&fact_table)?;

            let summary = driver.run_layer2_only(&pool, &corpus, &store, &progress)?;
            utils::to_csv(&store.all(), &output)?;
            print_json(&summary)?;
        }

        Command::Layer3ParallelCombined {
            documents,
            gazetteer,
            expanded,
            fact_table,
            output,
        } => {
            let pool = load_pool(&documents)?;
            let corpus = load_corpus(&gazetteer, expanded.as_deref())?;
            let store = load_store(&fact_table)?;

            let (l3a, l3b) = driver.run_layer3_combined(&pool, &corpus, &store, &progress)?;
            utils::to_csv(&store.all(), &output)?;
            print_json(&(l3a, l3b))?;
        }

        Command::ApplyCorrections {
            documents,
            fact_table,
            output,
        } => {
            let pool = load_pool(&documents)?;
            let store = load_store(&fact_table)?;
            let overlay = InMemoryCorrectionOverlay::default();

            let (summary, effective) = driver.apply_corrections(&pool, &store, &overlay, &progress)?;
            utils::to_csv(&effective, &output)?;
            print_json(&summary)?;
        }

        Command::ExpandLlpgRanges { gazetteer, output } => {
            let canonical: Vec<CanonicalAddress> = utils::from_csv(&gazetteer)?;
            let expanded = pipeline::expand_llpg_ranges(&canonical);
            utils::to_csv(&expanded, &output)?;
            println!("{{\"expanded_rows\": {}}}", expanded.len());
        }

        Command::ValidateIntegrity {
            documents,
            gazetteer,
            fact_table,
        } => {
            let pool = load_pool(&documents)?;
            let corpus = load_corpus(&gazetteer, None)?;
            let store = load_store(&fact_table)?;

            let violations = pipeline::validate_integrity(&pool, &corpus, &store);
            print_json(&violations)?;
            if !violations.is_empty() {
                std::process::exit(1);
            }
        }

        Command::Stats { fact_table, corrections } => {
            let store = load_store(&fact_table)?;
            let overlay = InMemoryCorrectionOverlay::default();
            if let Some(path) = corrections {
                for correction in utils::from_csv(&path)? {
                    overlay.upsert(correction)?;
                }
            }
            let stats = pipeline::compute_stats(&store, &overlay);
            print_json(&stats)?;
        }
    }

    Ok(())
}

fn load_pool(documents_path: &std::path::Path) -> anyhow::Result<InMemorySourcePool> {
    let documents: Vec<SourceDocument> = utils::from_csv(documents_path)
        .with_context(|| format!("reading source documents from {}", documents_path.display()))?;
    Ok(InMemorySourcePool::new(documents))
}

fn load_corpus(
    gazetteer_path: &std::path::Path,
    expanded_path: Option<&std::path::Path>,
) -> anyhow::Result<InMemoryAddressCorpus> {
    let canonical: Vec<CanonicalAddress> = utils::from_csv(gazetteer_path)
        .with_context(|| format!("reading gazetteer from {}", gazetteer_path.display()))?;
    let expanded: Vec<ExpandedAddress> = match expanded_path {
        Some(path) => utils::from_csv(path).with_context(|| format!("reading expanded overlay from {}", path.display()))?,
        None => Vec::new(),
    };
    Ok(InMemoryAddressCorpus::new(canonical, expanded))
}

fn load_store(fact_table_path: &std::path::Path) -> anyhow::Result<InMemoryFactStore> {
    let rows: Vec<FactRow> = utils::from_csv(fact_table_path)
        .with_context(|| format!("reading fact table from {}", fact_table_path.display()))?;
    let store = InMemoryFactStore::default();
    for row in rows {
        store.upsert(row)?;
    }
    Ok(store)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
