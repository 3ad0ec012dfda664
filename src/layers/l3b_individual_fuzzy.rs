//! L3b: individual fuzzy matching. The last automatic layer: documents group-fuzzy matching
//! left pending (a group of one, or a group whose representative search found nothing) get one
//! more trigram search run against their own address text, at a lower similarity floor than L2
//! or L3a since this is the last chance before a document is left for manual review.
use crate::config::PipelineConfig;
use crate::domain::{Decision as FactDecision, FactRow, MatchMethod, SourceDocument};
use crate::error::MatchResult;
use crate::layers::{apply_if_better, commit_batches, timed_search_trigram};
use crate::ports::{AddressCorpus, FactStore, ProgressSink, SourcePool};
use crate::similarity::{edit_distance, trigram_similarity};
use crate::validator::{Outcome, Validator};
use rayon::prelude::*;

const CANDIDATE_LIMIT: usize = 8;
/// Edit-distance ceiling a candidate must clear alongside the trigram search floor.
const MAX_EDIT_DISTANCE: usize = 20;
/// Similarity floor required at acceptance time, stricter than the search floor that merely
/// pulls candidates in for consideration.
const MIN_ACCEPT_SIMILARITY: f64 = 0.7;

/// Per-run counts from one L3b pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct L3bSummary {
    /// Documents still pending at the start of L3b.
    pub considered: usize,
    /// Documents upgraded to Accept or Review by an individual fuzzy match.
    pub upgraded: usize,
    /// Rows whose batch write failed and was rolled back.
    pub write_failures: usize,
}

/// Runs L3b over every document the fact table still shows as `Pending`.
pub fn individual_fuzzy_match(
    pool: &dyn SourcePool,
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
    progress: &dyn ProgressSink,
    config: &PipelineConfig,
) -> MatchResult<L3bSummary> {
    let pending: Vec<SourceDocument> = pool
        .all()
        .into_iter()
        .filter(|doc| {
            store
                .get(doc.id)
                .map(|row| row.decision == FactDecision::Pending)
                .unwrap_or(false)
        })
        .collect();

    progress.start_stage("l3b_individual_fuzzy", pending.len());

    let worker_pool = crate::worker_pool::build_pool(config.worker_count)?;
    let writes: Vec<FactRow> = worker_pool.install(|| {
        pending
            .par_iter()
            .filter_map(|doc| process_document(doc, corpus, store, config))
            .collect()
    });
    let upgraded = writes.len();

    let commit = commit_batches(store, writes, config.batch_size, "l3b_individual_fuzzy");

    progress.finish_stage("l3b_individual_fuzzy");
    Ok(L3bSummary {
        considered: pending.len(),
        upgraded,
        write_failures: commit.failed,
    })
}

fn process_document(
    doc: &SourceDocument,
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
    config: &PipelineConfig,
) -> Option<FactRow> {
    let address_text = doc.match_address();
    if Validator::suitable_for_matching(address_text).is_err() {
        return None;
    }

    let candidates = timed_search_trigram(
        corpus,
        address_text,
        config.l3b_candidate_threshold,
        CANDIDATE_LIMIT,
        config.query_timeout_ms,
        "l3b_individual_fuzzy",
    );
    let best = candidates
        .iter()
        .filter(|candidate| {
            edit_distance(address_text, &candidate.full_address) <= MAX_EDIT_DISTANCE
                && trigram_similarity(address_text, &candidate.full_address) >= MIN_ACCEPT_SIMILARITY
        })
        .filter_map(|candidate| {
            let decision = Validator::validate(address_text, &candidate.full_address);
            (decision.outcome != Outcome::Reject).then_some((candidate, decision))
        })
        .max_by(|(_, a), (_, b)| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))?;

    let (candidate, decision) = best;
    let fact_decision = match decision.outcome {
        Outcome::Accept => FactDecision::Accept,
        Outcome::Review => FactDecision::Review,
        Outcome::Reject => unreachable!("rejected candidates were filtered above"),
    };

    let mut row = store.get(doc.id)?;
    apply_if_better(
        &mut row,
        candidate.id,
        candidate.location,
        MatchMethod::IndividualFuzzy,
        fact_decision,
        decision.confidence,
    )
    .then_some(row)
}
