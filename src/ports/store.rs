//! The `store` port defines [`FactStore`] and [`CorrectionOverlay`], the write targets for the
//! matching pipeline, plus in-memory fake adapters.
use crate::domain::{effective_fact, CorrectionRow, FactRow};
use crate::error::{MatchError, MatchResult};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// The per-document fact table (FS). Single-writer per row by document id, so concurrent
/// `rayon` workers may call [`FactStore::upsert`] for distinct documents without contention.
pub trait FactStore: Send + Sync {
    /// Clears every fact row. Called once at the start of L1.
    fn truncate(&self) -> MatchResult<()>;

    /// Inserts or replaces the fact row for `row.document_id`.
    fn upsert(&self, row: FactRow) -> MatchResult<()>;

    /// The current fact row for `document_id`, if one has been written.
    fn get(&self, document_id: Uuid) -> Option<FactRow>;

    /// Every fact row currently stored.
    fn all(&self) -> Vec<FactRow>;

    /// True once a fact row exists for `document_id` (used by L1's "insert only documents not
    /// already inserted" phases).
    fn contains(&self, document_id: Uuid) -> bool;
}

/// The correction overlay (CO). Upsert-keyed on document id; later layers overwrite earlier
/// corrections for the same document.
pub trait CorrectionOverlay: Send + Sync {
    /// Inserts or replaces the correction for `row.document_id`.
    fn upsert(&self, row: CorrectionRow) -> MatchResult<()>;

    /// The current correction for `document_id`, if any.
    fn get(&self, document_id: Uuid) -> Option<CorrectionRow>;

    /// Every correction row currently stored.
    fn all(&self) -> Vec<CorrectionRow>;
}

/// An in-memory [`FactStore`] fake, used by tests and the CLI's in-memory mode.
#[derive(Debug, Default)]
pub struct InMemoryFactStore {
    rows: Mutex<HashMap<Uuid, FactRow>>,
}

impl FactStore for InMemoryFactStore {
    fn truncate(&self) -> MatchResult<()> {
        self.rows
            .lock()
            .map_err(|_| MatchError::SessionLost("fact store lock poisoned".to_string()))?
            .clear();
        Ok(())
    }

    fn upsert(&self, row: FactRow) -> MatchResult<()> {
        self.rows
            .lock()
            .map_err(|_| MatchError::SessionLost("fact store lock poisoned".to_string()))?
            .insert(row.document_id, row);
        Ok(())
    }

    fn get(&self, document_id: Uuid) -> Option<FactRow> {
        self.rows
            .lock()
            .expect("fact store lock poisoned")
            .get(&document_id)
            .cloned()
    }

    fn all(&self) -> Vec<FactRow> {
        let guard = self.rows.lock().expect("fact store lock poisoned");
        let mut rows: Vec<FactRow> = guard.values().cloned().collect();
        rows.sort_by_key(|r| r.document_id);
        rows
    }

    fn contains(&self, document_id: Uuid) -> bool {
        self.rows
            .lock()
            .expect("fact store lock poisoned")
            .contains_key(&document_id)
    }
}

/// An in-memory [`CorrectionOverlay`] fake, used by tests and the CLI's in-memory mode.
#[derive(Debug, Default)]
pub struct InMemoryCorrectionOverlay {
    rows: Mutex<HashMap<Uuid, CorrectionRow>>,
}

impl CorrectionOverlay for InMemoryCorrectionOverlay {
    fn upsert(&self, row: CorrectionRow) -> MatchResult<()> {
        self.rows
            .lock()
            .map_err(|_| MatchError::SessionLost("correction overlay lock poisoned".to_string()))?
            .insert(row.document_id, row);
        Ok(())
    }

    fn get(&self, document_id: Uuid) -> Option<CorrectionRow> {
        self.rows
            .lock()
            .expect("correction overlay lock poisoned")
            .get(&document_id)
            .cloned()
    }

    fn all(&self) -> Vec<CorrectionRow> {
        let guard = self.rows.lock().expect("correction overlay lock poisoned");
        let mut rows: Vec<CorrectionRow> = guard.values().cloned().collect();
        rows.sort_by_key(|r| r.document_id);
        rows
    }
}

/// Reconstructs the final, effective fact table by overlaying every correction onto its
/// original row: `coalesce(correction, original)` per document.
pub fn effective_fact_table(store: &dyn FactStore, overlay: &dyn CorrectionOverlay) -> Vec<FactRow> {
    store
        .all()
        .iter()
        .map(|row| {
            let correction = overlay.get(row.document_id);
            effective_fact(row, correction.as_ref())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decision, MatchMethod};

    #[test]
    fn contains_reflects_upserts() {
        let store = InMemoryFactStore::default();
        let doc_id = Uuid::new_v4();
        assert!(!store.contains(doc_id));
        store
            .upsert(FactRow::pending(doc_id, Uuid::new_v4(), "20003"))
            .unwrap();
        assert!(store.contains(doc_id));
    }

    #[test]
    fn correction_overrides_original_in_effective_table() {
        let store = InMemoryFactStore::default();
        let overlay = InMemoryCorrectionOverlay::default();
        let doc_id = Uuid::new_v4();
        let original_address = Uuid::new_v4();
        store
            .upsert(FactRow::pending(doc_id, original_address, "20003"))
            .unwrap();

        let golden = Uuid::new_v4();
        overlay
            .upsert(CorrectionRow {
                document_id: doc_id,
                planning_app_base: "20003".to_string(),
                original_address_id: None,
                original_confidence: 0.0,
                corrected_address_id: golden,
                corrected_location: crate::domain::Location::new(1.0, 2.0, 3.0, 4.0),
                corrected_confidence: 0.95,
                corrected_method: MatchMethod::GroupConsensus,
                reason: "5 votes".to_string(),
            })
            .unwrap();

        let effective = effective_fact_table(&store, &overlay);
        let row = effective.iter().find(|r| r.document_id == doc_id).unwrap();
        assert_eq!(row.matched_address_id, Some(golden));
        assert_eq!(row.decision, Decision::Accept);
    }
}
