//! End-to-end tests covering the pipeline's lettered scenarios against the in-memory ports.
use llpg_match::components::Components;
use llpg_match::config::PipelineConfig;
use llpg_match::domain::{CanonicalAddress, Decision, Location, SourceDocument};
use llpg_match::expansion::expand_ranges;
use llpg_match::pipeline::{validate_integrity, PipelineDriver};
use llpg_match::ports::{
    AddressCorpus, InMemoryAddressCorpus, InMemoryCorrectionOverlay, InMemoryFactStore, InMemorySourcePool,
    RecordingProgressSink,
};
use uuid::Uuid;

fn gazetteer_row(uprn: &str, full: &str) -> CanonicalAddress {
    CanonicalAddress::new(
        Some(uprn.to_string()),
        full,
        Components::default(),
        Location::new(1.0, 2.0, 50.0, -1.0),
        "test gazetteer",
    )
}

fn document(raw: &str, uprn: Option<&str>, external_reference: &str) -> SourceDocument {
    let (base, sequence) = SourceDocument::split_planning_reference(external_reference);
    SourceDocument {
        id: Uuid::new_v4(),
        doc_type: "decision_notice".to_string(),
        job_id: "job-1".to_string(),
        raw_address: raw.to_string(),
        standardized_address: None,
        raw_uprn: uprn.map(str::to_string),
        external_reference: external_reference.to_string(),
        date: "2024-01-01".to_string(),
        parsed_components: None,
        gopostal_processed: false,
        planning_app_base: base,
        planning_app_sequence: sequence,
    }
}

/// Scenario A: a document carrying the gazetteer's own UPRN matches via L1 phase 1 at full
/// confidence, regardless of any fuzzy-matching behavior downstream.
#[test]
fn scenario_a_uprn_exact_match() {
    let corpus = InMemoryAddressCorpus::new(
        vec![gazetteer_row("100023456789", "14 High Street, Alton, GU34 1AB")],
        vec![],
    );
    let pool = InMemorySourcePool::new(vec![document(
        "14 High Street, Alton, GU34 1AB",
        Some("100023456789"),
        "20001",
    )]);
    let store = InMemoryFactStore::default();
    let overlay = InMemoryCorrectionOverlay::default();
    let progress = RecordingProgressSink::default();
    let driver = PipelineDriver::new(PipelineConfig::default());

    driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

    let row = store.all().into_iter().next().unwrap();
    assert_eq!(row.decision, Decision::Accept);
    assert_eq!(row.confidence, 1.0);
}

/// Scenario B: a candidate with a similar street name but a different house number must never
/// be accepted, no matter how high its trigram similarity runs.
#[test]
fn scenario_b_house_number_mismatch_is_never_accepted() {
    let corpus = InMemoryAddressCorpus::new(
        vec![gazetteer_row("100000001", "147 London Road, Alton, GU34 2AB")],
        vec![],
    );
    let pool = InMemorySourcePool::new(vec![document("168 London Road, Alton, GU34 2AB", None, "20002")]);
    let store = InMemoryFactStore::default();
    let overlay = InMemoryCorrectionOverlay::default();
    let progress = RecordingProgressSink::default();
    let driver = PipelineDriver::new(PipelineConfig::default());

    driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

    let row = store.all().into_iter().next().unwrap();
    assert_ne!(row.decision, Decision::Accept);
}

/// Scenario C: when a plurality of a planning group's siblings agree on one matched address,
/// a dissenting sibling at lower confidence receives a correction pointing at the same address.
#[test]
fn scenario_c_group_consensus_corrects_the_dissenter() {
    let golden = gazetteer_row("100000010", "3 Vicarage Lane, Liss, GU33 7AX");
    let dissenting = gazetteer_row("100000099", "9 Different Road, Elsewhere, GU1 1AA");
    let golden_id = golden.id;
    let corpus = InMemoryAddressCorpus::new(vec![golden, dissenting], vec![]);

    let pool = InMemorySourcePool::new(vec![
        document("3 Vicarage Lane, Liss, GU33 7AX", None, "20010/A1"),
        document("3 Vicarage Ln, Liss, GU33 7AX", None, "20010/A2"),
        document("Land adjoining 3 Vicarage Lane, Liss", None, "20010/A3"),
    ]);
    let store = InMemoryFactStore::default();
    let overlay = InMemoryCorrectionOverlay::default();
    let progress = RecordingProgressSink::default();
    let driver = PipelineDriver::new(PipelineConfig::default());

    driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

    let corrections = overlay.all();
    assert_eq!(corrections.len(), 1, "{corrections:?}");
    assert_eq!(corrections[0].corrected_address_id, golden_id);
}

/// Scenario D: a gazetteer range header expands into exactly its individual numeric members,
/// each carrying the header's UPRN and location.
#[test]
fn scenario_d_range_expansion_yields_every_member() {
    let header = gazetteer_row("100000020", "10-12 Foo Rd");
    let header_id = header.id;
    let expanded = expand_ranges(&[header]);

    let mut fulls: Vec<String> = expanded.iter().map(|e| e.full_address.clone()).collect();
    fulls.sort();
    assert_eq!(fulls, vec!["10 Foo Rd", "11 Foo Rd", "12 Foo Rd"]);
    assert!(expanded.iter().all(|e| e.original_address_id == header_id));
    assert!(expanded.iter().all(|e| e.uprn.as_deref() == Some("100000020")));
}

/// A source document citing a single range member matches via L1 phase 3 against the expanded
/// overlay, not the fuzzy layers.
#[test]
fn scenario_d_range_member_matches_via_expanded_canonical() {
    let header = gazetteer_row("100000021", "10-11 Mill Lane, Liss");
    let expanded = expand_ranges(&[header.clone()]);
    let mut corpus = InMemoryAddressCorpus::new(vec![header], vec![]);
    corpus.extend_expanded(expanded);

    let pool = InMemorySourcePool::new(vec![document("11 Mill Lane, Liss", None, "20011")]);
    let store = InMemoryFactStore::default();
    let overlay = InMemoryCorrectionOverlay::default();
    let progress = RecordingProgressSink::default();
    let driver = PipelineDriver::new(PipelineConfig::default());

    driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

    let row = store.all().into_iter().next().unwrap();
    assert_eq!(row.decision, Decision::Accept);
    assert_eq!(
        row.method,
        Some(llpg_match::domain::MatchMethod::ExpandedCanonical)
    );
}

/// Scenario E: two documents sharing the exact same normalized raw address receive the same
/// match in one L2 pass (address-level dedup propagation).
#[test]
fn scenario_e_dedup_propagation() {
    let corpus = InMemoryAddressCorpus::new(
        vec![gazetteer_row("100000030", "5 Station Road, Alton, GU34 2DT")],
        vec![],
    );
    let pool = InMemorySourcePool::new(vec![
        document("5 Station Road, Alton, GU34 2DT", None, "20020/A1"),
        document("5 Station Road, Alton, GU34 2DT", None, "20020/A2"),
    ]);
    let store = InMemoryFactStore::default();
    let overlay = InMemoryCorrectionOverlay::default();
    let progress = RecordingProgressSink::default();
    let driver = PipelineDriver::new(PipelineConfig::default());

    driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

    let rows = store.all();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].matched_address_id, rows[1].matched_address_id);
    assert!(rows.iter().all(|r| r.decision == Decision::Accept));
}

/// Scenario F: a single, otherwise-unremarkable document with minor spelling and abbreviation
/// differences from the gazetteer still ends up matched by the time every layer has run.
#[test]
fn scenario_f_individual_fuzzy_match() {
    let corpus = InMemoryAddressCorpus::new(
        vec![gazetteer_row("100000040", "22 Mill Lane, Liss, Hampshire, GU33 7AA")],
        vec![],
    );
    let pool = InMemorySourcePool::new(vec![document("22 Mill Ln, Liss, Hants, GU33 7AA", None, "20030")]);
    let store = InMemoryFactStore::default();
    let overlay = InMemoryCorrectionOverlay::default();
    let progress = RecordingProgressSink::default();
    let driver = PipelineDriver::new(PipelineConfig::default());

    driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

    let row = store.all().into_iter().next().unwrap();
    assert_ne!(row.decision, Decision::Pending);
}

/// Integrity check: a full run leaves no "missing fact row" violations, for any mix of matched
/// and unmatched documents.
#[test]
fn integrity_holds_after_a_full_run() {
    let corpus = InMemoryAddressCorpus::new(
        vec![gazetteer_row("100000050", "1 Nowhere Lane, Nowhereton")],
        vec![],
    );
    let pool = InMemorySourcePool::new(vec![
        document("1 Nowhere Lane, Nowhereton", Some("100000050"), "20040"),
        document("Completely unrelated description", None, "20041"),
    ]);
    let store = InMemoryFactStore::default();
    let overlay = InMemoryCorrectionOverlay::default();
    let progress = RecordingProgressSink::default();
    let driver = PipelineDriver::new(PipelineConfig::default());

    driver.run_full(&pool, &corpus, &store, &overlay, &progress).unwrap();

    let violations = validate_integrity(&pool, &corpus, &store);
    assert!(
        violations.iter().all(|v| v.rule != "every_document_has_a_fact_row"),
        "{violations:?}"
    );
}
