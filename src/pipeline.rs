//! The `pipeline` module sequences the matching layers (L0-L4) against a set of ports, reports
//! progress, and offers the handful of standalone operations the CLI subcommands expose besides
//! a full run: range expansion, integrity validation, and fact-table statistics.
use crate::config::PipelineConfig;
use crate::domain::{CanonicalAddress, Decision, ExpandedAddress};
use crate::error::MatchResult;
use crate::expansion::expand_ranges;
use crate::layers::{
    conservative_search, group_consensus_correct, group_fuzzy_match, individual_fuzzy_match,
    populate_deterministic,
};
use crate::ports::{effective_fact_table, AddressCorpus, CorrectionOverlay, FactStore, ProgressSink, SourcePool};
use crate::worker_pool::StopFlag;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// The outcome of one full pipeline run (L0 through L4).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    /// Documents cleansed in L0.
    pub l0_cleansed: usize,
    /// Documents matched by raw UPRN equality in L1.
    pub l1_matched_uprn: usize,
    /// Documents matched by base canonical equality in L1.
    pub l1_matched_canonical: usize,
    /// Documents matched by expanded canonical equality in L1.
    pub l1_matched_expanded: usize,
    /// Documents left pending after L1.
    pub l1_unmatched: usize,
    /// Documents (including dedup siblings) upgraded by L2.
    pub l2_upgraded: usize,
    /// Planning groups that qualified for L3a.
    pub l3a_groups_qualified: usize,
    /// Documents upgraded by L3a.
    pub l3a_upgraded: usize,
    /// Documents upgraded by L3b.
    pub l3b_upgraded: usize,
    /// Planning groups that produced a qualifying L4 consensus.
    pub l4_groups_with_consensus: usize,
    /// Corrections written by L4.
    pub l4_corrections_written: usize,
    /// True if the run stopped early because [`StopFlag::request_stop`] was called.
    pub stopped_early: bool,
}

/// Sequences the matching layers against a fixed set of ports. Holds no state of its own beyond
/// the config and stop flag; every method takes the ports it needs explicitly, so a caller can
/// point the same driver at different stores across tests.
pub struct PipelineDriver {
    config: PipelineConfig,
    stop_flag: StopFlag,
}

impl PipelineDriver {
    /// Constructs a driver from `config`, with a fresh, unset stop flag.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stop_flag: StopFlag::new(),
        }
    }

    /// The stop flag this driver checks between stages. Clone it to request a stop from another
    /// thread or signal handler.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    /// The config this driver was constructed with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs L0 through L4 in order, stopping early (without running later stages) if the stop
    /// flag is set between stages.
    pub fn run_full(
        &self,
        pool: &dyn SourcePool,
        corpus: &dyn AddressCorpus,
        store: &dyn FactStore,
        overlay: &dyn CorrectionOverlay,
        progress: &dyn ProgressSink,
    ) -> MatchResult<PipelineSummary> {
        let mut summary = PipelineSummary::default();

        summary.l0_cleansed = crate::layers::cleanse(pool)?;
        if self.stop_flag.is_stopped() {
            summary.stopped_early = true;
            return Ok(summary);
        }

        let l1 = populate_deterministic(pool, corpus, store, progress)?;
        summary.l1_matched_uprn = l1.matched_uprn;
        summary.l1_matched_canonical = l1.matched_canonical;
        summary.l1_matched_expanded = l1.matched_expanded;
        summary.l1_unmatched = l1.unmatched;
        if self.stop_flag.is_stopped() {
            summary.stopped_early = true;
            return Ok(summary);
        }

        let l2 = conservative_search(pool, corpus, store, progress, &self.config)?;
        summary.l2_upgraded = l2.upgraded;
        if self.stop_flag.is_stopped() {
            summary.stopped_early = true;
            return Ok(summary);
        }

        let l3a = group_fuzzy_match(pool, corpus, store, progress, &self.config)?;
        summary.l3a_groups_qualified = l3a.groups_qualified;
        summary.l3a_upgraded = l3a.documents_upgraded;
        if self.stop_flag.is_stopped() {
            summary.stopped_early = true;
            return Ok(summary);
        }

        let l3b = individual_fuzzy_match(pool, corpus, store, progress, &self.config)?;
        summary.l3b_upgraded = l3b.upgraded;
        if self.stop_flag.is_stopped() {
            summary.stopped_early = true;
            return Ok(summary);
        }

        let l4 = group_consensus_correct(pool, store, overlay, progress)?;
        summary.l4_groups_with_consensus = l4.groups_with_consensus;
        summary.l4_corrections_written = l4.corrections_written;

        Ok(summary)
    }

    /// Runs only L2 (the `layer2-parallel` CLI subcommand), against whatever L1 already wrote.
    pub fn run_layer2_only(
        &self,
        pool: &dyn SourcePool,
        corpus: &dyn AddressCorpus,
        store: &dyn FactStore,
        progress: &dyn ProgressSink,
    ) -> MatchResult<crate::layers::L2Summary> {
        conservative_search(pool, corpus, store, progress, &self.config)
    }

    /// Runs L3a followed by L3b (the `layer3-parallel-combined` CLI subcommand).
    pub fn run_layer3_combined(
        &self,
        pool: &dyn SourcePool,
        corpus: &dyn AddressCorpus,
        store: &dyn FactStore,
        progress: &dyn ProgressSink,
    ) -> MatchResult<(crate::layers::L3aSummary, crate::layers::L3bSummary)> {
        let l3a = group_fuzzy_match(pool, corpus, store, progress, &self.config)?;
        let l3b = individual_fuzzy_match(pool, corpus, store, progress, &self.config)?;
        Ok((l3a, l3b))
    }

    /// Runs L4 alone (the `apply-corrections` CLI subcommand) and returns the reconstructed
    /// effective fact table, with every correction overlaid.
    pub fn apply_corrections(
        &self,
        pool: &dyn SourcePool,
        store: &dyn FactStore,
        overlay: &dyn CorrectionOverlay,
        progress: &dyn ProgressSink,
    ) -> MatchResult<(crate::layers::L4Summary, Vec<crate::domain::FactRow>)> {
        let summary = group_consensus_correct(pool, store, overlay, progress)?;
        Ok((summary, effective_fact_table(store, overlay)))
    }

    /// Optionally snapshots the effective fact table to `path` as CSV, for forensic comparison
    /// between runs.
    pub fn snapshot_fact_table(
        &self,
        store: &dyn FactStore,
        overlay: &dyn CorrectionOverlay,
        path: impl AsRef<Path>,
    ) -> MatchResult<()> {
        let rows = effective_fact_table(store, overlay);
        crate::utils::to_csv(&rows, path)
    }
}

/// Expands every range-shaped entry in `gazetteer` (the `expand-llpg-ranges` CLI subcommand).
/// Returns the new rows; the caller is responsible for merging them into whichever
/// [`AddressCorpus`] backs the run, since the trait is read-only and expansion is a corpus-
/// building step that runs ahead of a pipeline invocation rather than during one.
pub fn expand_llpg_ranges(gazetteer: &[CanonicalAddress]) -> Vec<ExpandedAddress> {
    expand_ranges(gazetteer)
}

/// One integrity-check finding (the `validate-integrity` CLI subcommand).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityViolation {
    /// Which invariant was violated.
    pub rule: &'static str,
    /// Human-readable detail, e.g. the offending document or UPRN.
    pub detail: String,
}

/// Checks the universal invariants the fact table must hold: every source document has
/// exactly one fact row, every matched row carries a location, and no two non-historic gazetteer
/// rows share a UPRN.
pub fn validate_integrity(
    pool: &dyn SourcePool,
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();

    for doc in pool.all() {
        if store.get(doc.id).is_none() {
            violations.push(IntegrityViolation {
                rule: "every_document_has_a_fact_row",
                detail: format!("document {} has no fact row", doc.id),
            });
        }
    }

    for row in store.all() {
        if row.matched_address_id.is_some() && row.matched_location.is_none() {
            violations.push(IntegrityViolation {
                rule: "location_address_consistency",
                detail: format!("document {} has a matched address but no location", row.document_id),
            });
        }
        if row.matched_address_id.is_none() && row.decision == Decision::Accept {
            violations.push(IntegrityViolation {
                rule: "accept_requires_a_match",
                detail: format!("document {} is Accept with no matched address", row.document_id),
            });
        }
    }

    let mut seen_uprns: HashMap<&str, usize> = HashMap::new();
    let canonical = corpus.all_canonical();
    for addr in &canonical {
        if addr.is_historic {
            continue;
        }
        if let Some(uprn) = addr.uprn.as_deref() {
            *seen_uprns.entry(uprn).or_insert(0) += 1;
        }
    }
    for (uprn, count) in seen_uprns {
        if count > 1 {
            violations.push(IntegrityViolation {
                rule: "uprn_uniqueness_among_non_historic",
                detail: format!("uprn {uprn} appears on {count} non-historic addresses"),
            });
        }
    }

    violations
}

/// Summary statistics over the effective fact table (the `stats` CLI subcommand).
#[derive(Debug, Clone, Default, Serialize)]
pub struct FactTableStats {
    /// Total rows.
    pub total: usize,
    /// Rows per [`Decision`] variant, keyed by its display name.
    pub by_decision: HashMap<String, usize>,
    /// Rows per [`MatchMethod`] variant among matched rows, keyed by its display name.
    pub by_method: HashMap<String, usize>,
    /// Mean confidence across all rows.
    pub mean_confidence: f64,
}

/// Computes [`FactTableStats`] over the effective (correction-overlaid) fact table.
pub fn compute_stats(store: &dyn FactStore, overlay: &dyn CorrectionOverlay) -> FactTableStats {
    let rows = effective_fact_table(store, overlay);
    let mut stats = FactTableStats {
        total: rows.len(),
        ..Default::default()
    };
    let mut confidence_sum = 0.0;
    for row in &rows {
        *stats.by_decision.entry(row.decision.to_string()).or_insert(0) += 1;
        if let Some(method) = row.method {
            *stats.by_method.entry(method.to_string()).or_insert(0) += 1;
        }
        confidence_sum += row.confidence;
    }
    if !rows.is_empty() {
        stats.mean_confidence = confidence_sum / rows.len() as f64;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Components;
    use crate::domain::{CanonicalAddress, Location, SourceDocument};
    use crate::ports::{InMemoryAddressCorpus, InMemoryCorrectionOverlay, InMemoryFactStore, InMemorySourcePool, RecordingProgressSink};
    use uuid::Uuid;

    fn doc(raw: &str, uprn: Option<&str>, base: &str) -> SourceDocument {
        SourceDocument {
            id: Uuid::new_v4(),
            doc_type: "decision_notice".to_string(),
            job_id: "job-1".to_string(),
            raw_address: raw.to_string(),
            standardized_address: None,
            raw_uprn: uprn.map(str::to_string),
            external_reference: base.to_string(),
            date: "2024-01-01".to_string(),
            parsed_components: None,
            gopostal_processed: false,
            planning_app_base: base.to_string(),
            planning_app_sequence: None,
        }
    }

    #[test]
    fn full_run_leaves_every_document_with_a_fact_row() {
        let gazetteer_row = CanonicalAddress::new(
            Some("100".to_string()),
            "14 High Street, Alton, GU34 1AB",
            Components::default(),
            Location::new(1.0, 2.0, 3.0, 4.0),
            "test",
        );
        let corpus = InMemoryAddressCorpus::new(vec![gazetteer_row], vec![]);
        let documents = vec![
            doc("14 High Street, Alton, GU34 1AB", Some("100"), "20040"),
            doc("Some Unrelated Address", None, "20041"),
        ];
        let pool = InMemorySourcePool::new(documents.clone());
        let store = InMemoryFactStore::default();
        let overlay = InMemoryCorrectionOverlay::default();
        let progress = RecordingProgressSink::default();
        let driver = PipelineDriver::new(PipelineConfig::default());

        let summary = driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

        assert!(!summary.stopped_early);
        assert_eq!(summary.l1_matched_uprn, 1);
        let violations = validate_integrity(&pool, &corpus, &store);
        assert!(
            violations
                .iter()
                .all(|v| v.rule != "every_document_has_a_fact_row"),
            "{violations:?}"
        );
    }

    #[test]
    fn stop_flag_halts_before_later_stages() {
        let corpus = InMemoryAddressCorpus::default();
        let documents = vec![doc("Some Address", None, "20042")];
        let pool = InMemorySourcePool::new(documents);
        let store = InMemoryFactStore::default();
        let overlay = InMemoryCorrectionOverlay::default();
        let progress = RecordingProgressSink::default();
        let driver = PipelineDriver::new(PipelineConfig::default());
        driver.stop_flag().request_stop();

        let summary = driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();
        assert!(summary.stopped_early);
    }
}
